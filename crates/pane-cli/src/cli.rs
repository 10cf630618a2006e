use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pane_keys::{LinkBucket, LinkKey, LinkOwner, PaneKey, PaneKind, ViewId};
use pane_store::IconTarget;

#[derive(Parser)]
#[command(
    name = "pane",
    about = "Pane start page: views, stations, items and links",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// JSON data file holding the store
    #[arg(long, global = true, default_value = "pane.json")]
    pub store: PathBuf,

    /// TOML file overriding the store defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the root view, registry, trash and pools if missing
    Init,
    /// List the panes of a view
    Show(ShowArgs),
    /// Create a station, item or dummy
    Add(AddArgs),
    /// Retitle a pane
    Rename(RenameArgs),
    /// Move a pane on its canvas
    Move(MoveArgs),
    /// Resize a pane
    Resize(ResizeArgs),
    /// Set a pane icon directly or from a pool
    Icon(IconArgs),
    /// Delete a pane (item links go to the trash)
    Delete(KeyArgs),
    /// Move a pane into the view a station opens
    Reparent(ReparentArgs),
    /// Set a view background directly or from a pool
    Background(BackgroundArgs),
    /// Manage the links of an item or bucket
    Link(LinkArgs),
    /// Inspect or empty the trash
    Trash(TrashArgs),
    /// Inspect or extend the shared gif and background pools
    Pool(PoolArgs),
    /// Check referential integrity of the whole store
    Validate,
    /// Write every record to a JSON document
    Export(FileArgs),
    /// Replace the store with a JSON document
    Import(ImportArgs),
}

#[derive(Args)]
pub struct ShowArgs {
    /// View to list; defaults to the root view
    pub view: Option<ViewId>,
}

#[derive(Args)]
#[command(allow_negative_numbers = true)]
pub struct AddArgs {
    pub view: ViewId,
    /// station | item | dummy (or s | i | d)
    pub kind: PaneKind,
    pub title: String,
    #[arg(long, default_value_t = 0.0)]
    pub x: f64,
    #[arg(long, default_value_t = 0.0)]
    pub y: f64,
}

#[derive(Args)]
pub struct RenameArgs {
    pub key: PaneKey,
    pub title: String,
}

#[derive(Args)]
#[command(allow_negative_numbers = true)]
pub struct MoveArgs {
    pub key: PaneKey,
    pub left: f64,
    pub top: f64,
}

#[derive(Args)]
pub struct ResizeArgs {
    pub key: PaneKey,
    pub width: f64,
    pub height: f64,
}

#[derive(Args)]
pub struct IconArgs {
    pub key: PaneKey,
    #[arg(required_unless_present = "pick")]
    pub icon: Option<String>,
    /// Use the image of a pool link instead
    #[arg(long, conflicts_with = "icon")]
    pub pick: Option<LinkKey>,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: PaneKey,
}

#[derive(Args)]
pub struct ReparentArgs {
    pub key: PaneKey,
    /// Station whose view receives the pane
    pub station: PaneKey,
}

#[derive(Args)]
pub struct BackgroundArgs {
    pub view: ViewId,
    #[arg(required_unless_present = "pick")]
    pub url: Option<String>,
    /// Use the image of a pool link instead
    #[arg(long, conflicts_with = "url")]
    pub pick: Option<LinkKey>,
}

#[derive(Args)]
pub struct LinkArgs {
    #[command(subcommand)]
    pub action: LinkAction,
}

#[derive(Subcommand)]
pub enum LinkAction {
    /// Append a link to an item or bucket
    Add {
        owner: LinkOwner,
        url: String,
        /// Defaults to the URL
        title: Option<String>,
    },
    /// Move a link to the trash
    Rm { link: LinkKey },
    /// Delete a trash link for good
    Purge { link: LinkKey },
    /// Rewrite a link's icon (or its URL with --field link)
    Icon {
        link: LinkKey,
        #[arg(required_unless_present = "pick")]
        value: Option<String>,
        #[arg(long, value_enum, default_value = "icon")]
        field: IconField,
        /// Use the image of a pool link as the icon
        #[arg(long, conflicts_with_all = ["value", "field"])]
        pick: Option<LinkKey>,
    },
    /// Make the icon follow the URL again
    Reset { link: LinkKey },
    /// Retitle a link
    Rename { link: LinkKey, title: String },
    /// Move a trash link back under an owner
    Restore { link: LinkKey, to: LinkOwner },
    /// List the links of an item or bucket
    Ls { owner: LinkOwner },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum IconField {
    Icon,
    Link,
}

impl From<IconField> for IconTarget {
    fn from(field: IconField) -> Self {
        match field {
            IconField::Icon => IconTarget::Icon,
            IconField::Link => IconTarget::Link,
        }
    }
}

#[derive(Args)]
pub struct TrashArgs {
    #[command(subcommand)]
    pub action: TrashAction,
}

#[derive(Subcommand)]
pub enum TrashAction {
    Ls,
    Empty,
}

#[derive(Args)]
pub struct PoolArgs {
    #[command(subcommand)]
    pub action: PoolAction,
}

#[derive(Subcommand)]
pub enum PoolAction {
    Ls { pool: PoolName },
    Add {
        pool: PoolName,
        url: String,
        title: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PoolName {
    Gifs,
    Backgrounds,
}

impl From<PoolName> for LinkBucket {
    fn from(pool: PoolName) -> Self {
        match pool {
            PoolName::Gifs => LinkBucket::Gifs,
            PoolName::Backgrounds => LinkBucket::Backgrounds,
        }
    }
}

#[derive(Args)]
pub struct FileArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
    /// Import even if the document has integrity violations
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["pane", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
        assert_eq!(cli.store, PathBuf::from("pane.json"));
    }

    #[test]
    fn parse_show_default_view() {
        let cli = Cli::try_parse_from(["pane", "show"]).unwrap();
        if let Command::Show(args) = cli.command {
            assert_eq!(args.view, None);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_add() {
        let cli = Cli::try_parse_from(["pane", "add", "0", "i", "News", "--x", "-12.5"]).unwrap();
        if let Command::Add(args) = cli.command {
            assert_eq!(args.view, ViewId::ROOT);
            assert_eq!(args.kind, PaneKind::Item);
            assert_eq!(args.title, "News");
            assert_eq!(args.x, -12.5);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_move_negative() {
        let cli = Cli::try_parse_from(["pane", "move", "0,1,d", "-5", "40"]).unwrap();
        if let Command::Move(args) = cli.command {
            assert_eq!(args.key, PaneKey::dummy(ViewId::ROOT, 1));
            assert_eq!((args.left, args.top), (-5.0, 40.0));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn reject_bad_pane_key() {
        assert!(Cli::try_parse_from(["pane", "delete", "0,1,x"]).is_err());
        assert!(Cli::try_parse_from(["pane", "delete", "0,1,i,0"]).is_err());
    }

    #[test]
    fn parse_link_add_to_bucket() {
        let cli = Cli::try_parse_from(["pane", "link", "add", "gifs", "https://g/cat.gif"]).unwrap();
        if let Command::Link(LinkArgs { action: LinkAction::Add { owner, title, .. } }) = cli.command {
            assert_eq!(owner, LinkOwner::Bucket(LinkBucket::Gifs));
            assert_eq!(title, None);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_link_icon_field() {
        let cli = Cli::try_parse_from(["pane", "link", "icon", "0,0,i,2", "http://b", "--field", "link"]).unwrap();
        if let Command::Link(LinkArgs { action: LinkAction::Icon { link, field, .. } }) = cli.command {
            assert_eq!(link.to_string(), "0,0,i,2");
            assert_eq!(field, IconField::Link);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn icon_needs_value_or_pick() {
        assert!(Cli::try_parse_from(["pane", "icon", "0,0,s"]).is_err());
        assert!(Cli::try_parse_from(["pane", "icon", "0,0,s", "--pick", "gifs,0"]).is_ok());
        assert!(Cli::try_parse_from(["pane", "icon", "0,0,s", "x.png", "--pick", "gifs,0"]).is_err());
    }

    #[test]
    fn parse_import_force() {
        let cli = Cli::try_parse_from(["pane", "import", "backup.json", "--force"]).unwrap();
        if let Command::Import(args) = cli.command {
            assert!(args.force);
            assert_eq!(args.file, PathBuf::from("backup.json"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "pane", "trash", "ls", "--store", "/tmp/p.json", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.store, PathBuf::from("/tmp/p.json"));
        assert!(matches!(cli.command, Command::Trash(TrashArgs { action: TrashAction::Ls })));
    }
}
