use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use pane_keys::{LinkBucket, LinkOwner};
use pane_kv::JsonFileKv;
use pane_store::{
    ExportDocument, HierarchicalStore, ImportMode, LinkRecord, Pane, PaneBody, PickTarget, Position,
    StoreConfig, ValidationReport,
};
use serde::Serialize;
use tracing::debug;

use crate::cli::*;

type Store = HierarchicalStore<JsonFileKv>;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let kv = JsonFileKv::open(&cli.store)
        .await
        .with_context(|| format!("opening store {}", cli.store.display()))?;
    let store = HierarchicalStore::open(kv, config).await?;
    let out = Output { format: cli.format };

    match cli.command {
        Command::Init => cmd_init(&store, &out).await,
        Command::Show(args) => cmd_show(&store, &out, args).await,
        Command::Add(args) => {
            let pane = store
                .create_object(args.view, args.kind, &args.title, Position::new(args.x, args.y))
                .await?;
            out.pane("Created", &pane)
        }
        Command::Rename(args) => out.pane("Renamed", &store.rename_object(args.key, &args.title).await?),
        Command::Move(args) => out.pane("Moved", &store.move_object(args.key, args.left, args.top).await?),
        Command::Resize(args) => {
            out.pane("Resized", &store.resize_object(args.key, args.width, args.height).await?)
        }
        Command::Icon(args) => {
            if let Some(pick) = args.pick {
                store.apply_background(pick, PickTarget::PaneIcon(args.key)).await?;
                out.pane("Icon set", &store.pane(args.key).await?)
            } else {
                let icon = args.icon.unwrap_or_default();
                out.pane("Icon set", &store.change_object_icon(args.key, &icon).await?)
            }
        }
        Command::Delete(args) => {
            let outcome = store.delete_object(args.key).await?;
            out.emit(&outcome.trashed, || {
                println!("{} Deleted {}", "✓".green().bold(), outcome.key.to_string().yellow());
                for key in &outcome.trashed {
                    println!("  {} {}", "trashed:".dimmed(), key);
                }
            })
        }
        Command::Reparent(args) => {
            out.pane("Moved", &store.move_into_station(args.key, args.station).await?)
        }
        Command::Background(args) => {
            let view = if let Some(pick) = args.pick {
                store.apply_background(pick, PickTarget::ViewBackground(args.view)).await?;
                store.view(args.view).await?
            } else {
                let url = args.url.unwrap_or_default();
                store.set_view_background(args.view, &url).await?
            };
            out.emit(&view, || {
                println!("{} View {} background: {}", "✓".green().bold(), view.id, view.background.blue())
            })
        }
        Command::Link(args) => cmd_link(&store, &out, args.action).await,
        Command::Trash(args) => match args.action {
            TrashAction::Ls => out.links("trash", &store.trash_links().await?),
            TrashAction::Empty => {
                let removed = store.empty_trash().await?;
                out.emit(&removed, || {
                    println!("{} Emptied trash: {} link(s) removed", "✓".green().bold(), removed)
                })
            }
        },
        Command::Pool(args) => match args.action {
            PoolAction::Ls { pool } => {
                let bucket = LinkBucket::from(pool);
                out.links(bucket.name(), &store.pool_links(bucket).await?)
            }
            PoolAction::Add { pool, url, title } => {
                let owner = LinkOwner::Bucket(pool.into());
                let link = store.add_link(owner, &url, title.as_deref().unwrap_or(&url)).await?;
                out.link("Added", &link)
            }
        },
        Command::Validate => {
            let report = store.validate().await?;
            out.report(&report)?;
            if !report.is_valid() {
                anyhow::bail!("{} integrity violation(s)", report.violations.len());
            }
            Ok(())
        }
        Command::Export(args) => cmd_export(&store, &out, &args.file).await,
        Command::Import(args) => cmd_import(&store, &out, args).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let Some(path) = path else {
        return Ok(StoreConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

async fn cmd_init(store: &Store, out: &Output) -> anyhow::Result<()> {
    let report = store.init().await?;
    out.emit(&report.created, || {
        if report.is_fresh() {
            println!("{} Initialized store in {}", "✓".green().bold(), store.kv().path().display());
            for key in &report.created {
                println!("  {} {}", "created:".green(), key);
            }
        } else {
            println!("Store already initialized.");
        }
    })
}

async fn cmd_show(store: &Store, out: &Output, args: ShowArgs) -> anyhow::Result<()> {
    let id = args.view.unwrap_or(store.config().root_view);
    let view = store.view(id).await?;
    let panes = store.children(id).await?;

    #[derive(Serialize)]
    struct Listing<'a> {
        view: &'a pane_store::View,
        panes: &'a [Pane],
    }

    out.emit(&Listing { view: &view, panes: &panes }, || {
        let parent = view.parent.map_or_else(|| "-".to_string(), |p| p.to_string());
        println!("View {}  (parent: {})", view.id.to_string().bold(), parent);
        if !view.background.is_empty() {
            println!("  background: {}", view.background.blue());
        }
        if panes.is_empty() {
            println!("  {}", "(empty)".dimmed());
        }
        for pane in &panes {
            println!("  {}", describe_pane(pane));
        }
    })
}

async fn cmd_link(store: &Store, out: &Output, action: LinkAction) -> anyhow::Result<()> {
    match action {
        LinkAction::Add { owner, url, title } => {
            let link = store.add_link(owner, &url, title.as_deref().unwrap_or(&url)).await?;
            out.link("Added", &link)
        }
        LinkAction::Rm { link } => {
            let trash_key = store.remove_link(link.owner, link).await?;
            out.emit(&trash_key, || {
                if link.owner.is_trash() {
                    println!("{} Deleted {}", "✓".green().bold(), link);
                } else {
                    println!("{} Moved {} to {}", "✓".green().bold(), link, trash_key.to_string().yellow());
                }
            })
        }
        LinkAction::Purge { link } => {
            store.remove_link_permanently(link).await?;
            out.emit(&link, || println!("{} Deleted {}", "✓".green().bold(), link))
        }
        LinkAction::Icon { link, value, field, pick } => {
            let record = if let Some(pick) = pick {
                store.apply_background(pick, PickTarget::LinkIcon(link)).await?;
                store.link(link).await?
            } else {
                let value = value.unwrap_or_default();
                store.change_link_icon(link, field.into(), &value).await?
            };
            out.link("Updated", &record)
        }
        LinkAction::Reset { link } => out.link("Reset", &store.reset_link_icon(link).await?),
        LinkAction::Rename { link, title } => out.link("Renamed", &store.rename_link(link, &title).await?),
        LinkAction::Restore { link, to } => out.link("Restored", &store.restore_link(link, to).await?),
        LinkAction::Ls { owner } => out.links(&owner.to_string(), &store.links_of(owner).await?),
    }
}

async fn cmd_export(store: &Store, out: &Output, file: &Path) -> anyhow::Result<()> {
    let doc = store.export().await?;
    let text = serde_json::to_string_pretty(&doc)?;
    std::fs::write(file, text).with_context(|| format!("writing {}", file.display()))?;
    out.emit(&doc.entries.len(), || {
        println!(
            "{} Exported {} record(s) to {}",
            "✓".green().bold(),
            doc.entries.len(),
            file.display()
        )
    })
}

async fn cmd_import(store: &Store, out: &Output, args: ImportArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let doc: ExportDocument =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", args.file.display()))?;
    let count = doc.entries.len();
    let mode = if args.force { ImportMode::Forced } else { ImportMode::Validated };
    let report = store.import(doc, mode).await?;
    out.emit(&report, || {
        println!("{} Imported {} record(s)", "✓".green().bold(), count);
        if !report.is_valid() {
            println!(
                "  {} {} violation(s) imported as-is",
                "warning:".yellow().bold(),
                report.violations.len()
            );
        }
    })
}

fn describe_pane(pane: &Pane) -> String {
    let key = pane.key().to_string();
    let detail = match &pane.body {
        PaneBody::Station { target } => format!("-> view {target}"),
        PaneBody::Item { links, .. } => format!("{} link(s)", links.len()),
        PaneBody::Dummy {} => String::new(),
    };
    format!(
        "{:<10} {:<8} {}  {}",
        key.yellow(),
        pane.kind().name().cyan(),
        pane.base.title.bold(),
        detail.dimmed()
    )
}

/// Renders results as colored text or JSON.
struct Output {
    format: OutputFormat,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }

    fn pane(&self, verb: &str, pane: &Pane) -> anyhow::Result<()> {
        self.emit(pane, || println!("{} {} {}", "✓".green().bold(), verb, describe_pane(pane)))
    }

    fn link(&self, verb: &str, link: &LinkRecord) -> anyhow::Result<()> {
        self.emit(link, || {
            println!("{} {} {}", "✓".green().bold(), verb, link.id.to_string().yellow());
            println!("  {} {}", link.title.bold(), link.link.blue());
        })
    }

    fn links(&self, owner: &str, links: &[LinkRecord]) -> anyhow::Result<()> {
        self.emit(&links, || {
            println!("Links of {}", owner.bold());
            if links.is_empty() {
                println!("  {}", "(none)".dimmed());
            }
            for link in links {
                println!("  {:<14} {}  {}", link.id.to_string().yellow(), link.title.bold(), link.link.blue());
            }
        })
    }

    fn report(&self, report: &ValidationReport) -> anyhow::Result<()> {
        self.emit(report, || {
            println!(
                "{} key(s): {} view(s), {} pane(s), {} link(s)",
                report.key_count, report.view_count, report.pane_count, report.link_count
            );
            if report.is_valid() {
                println!("{} No integrity violations.", "✓".green().bold());
            }
            for v in &report.violations {
                println!("  {} {:<12} {:?}: {}", "✗".red().bold(), v.key.yellow(), v.kind, v.description);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pane_kv::KvStore;

    async fn run(path: &Path, args: &[&str]) -> anyhow::Result<()> {
        let store = path.to_str().unwrap();
        let mut argv = vec!["pane", "--store", store];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap()).await
    }

    async fn reopen(path: &Path) -> Store {
        let kv = JsonFileKv::open(path).await.unwrap();
        HierarchicalStore::open(kv, StoreConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn init_add_and_link() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pane.json");

        run(&path, &["init"]).await.unwrap();
        run(&path, &["add", "0", "item", "News"]).await.unwrap();
        run(&path, &["link", "add", "0,0,i", "http://a.com", "A"]).await.unwrap();
        run(&path, &["link", "rm", "0,0,i,0"]).await.unwrap();
        run(&path, &["validate"]).await.unwrap();

        let store = reopen(&path).await;
        assert_eq!(store.trash_links().await.unwrap().len(), 1);
        assert_eq!(store.children(pane_keys::ViewId::ROOT).await.unwrap()[0].base.title, "News");
    }

    #[tokio::test]
    async fn guarded_delete_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pane.json");
        run(&path, &["init"]).await.unwrap();
        run(&path, &["add", "0", "s", "Work"]).await.unwrap();
        run(&path, &["add", "1", "d", "spacer"]).await.unwrap();

        assert!(run(&path, &["delete", "0,0,s"]).await.is_err());
        run(&path, &["delete", "1,0,d"]).await.unwrap();
        run(&path, &["delete", "0,0,s"]).await.unwrap();
    }

    #[tokio::test]
    async fn export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.json");
        let target = dir.path().join("b.json");
        let backup = dir.path().join("backup.json");
        let backup_arg = backup.to_str().unwrap();

        run(&source, &["init"]).await.unwrap();
        run(&source, &["add", "0", "i", "Mail"]).await.unwrap();
        run(&source, &["export", backup_arg]).await.unwrap();
        run(&target, &["import", backup_arg]).await.unwrap();

        let a = reopen(&source).await.kv().get_all().await.unwrap();
        let b = reopen(&target).await.kv().get_all().await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn config_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pane.toml");
        std::fs::write(&path, "default_background = \"sky.jpg\"\n[pane_size]\nwidth = 64.0\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.default_background, "sky.jpg");
        assert_eq!(config.pane_size.width, 64.0);
        assert_eq!(config.pane_size.height, 100.0);
        assert_eq!(load_config(None).unwrap(), StoreConfig::default());
    }

    #[test]
    fn describe_station() {
        let pane: Pane = serde_json::from_value(serde_json::json!({
            "id": 0, "view": 0, "title": "Work", "type": "station", "target": 4
        }))
        .unwrap();
        colored::control::set_override(false);
        assert!(describe_pane(&pane).contains("-> view 4"));
    }
}
