//! `archops` command line

mod commands;

use anyhow::Context;
use archops_core::telemetry::{self, LogFormat};
use archops_core::CompanionConfig;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use commands::{CatalogKind, Session};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "archops.toml";

fn cli() -> Command {
    Command::new("archops")
        .version(archops_core::VERSION)
        .about("Browse the architecture catalog and install diagram sources")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (default: ./archops.toml when present)"),
        )
        .arg(
            Arg::new("workspace")
                .long("workspace")
                .short('w')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Workspace directory (default: current directory)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("tree")
                .about("Print a catalog tree")
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .default_value("architecture")
                        .value_parser(["architecture", "capabilities", "journeys"])
                        .help("Catalog to browse"),
                )
                .arg(
                    Arg::new("depth")
                        .long("depth")
                        .default_value("2")
                        .value_parser(value_parser!(usize))
                        .help("Levels to expand below the root"),
                ),
        )
        .subcommand(
            Command::new("content")
                .about("Print the content behind a docs or dsl reference")
                .arg(Arg::new("reference").required(true)),
        )
        .subcommand(
            Command::new("install")
                .about("Write a catalog diagram source into the workspace")
                .arg(
                    Arg::new("reference")
                        .required(true)
                        .help("dsl reference of the catalog leaf"),
                ),
        )
        .subcommand(
            Command::new("sign")
                .about("Print the authentication headers for a request")
                .arg(Arg::new("method").required(true))
                .arg(Arg::new("path").required(true))
                .arg(
                    Arg::new("body")
                        .long("body")
                        .value_parser(value_parser!(PathBuf))
                        .help("File holding the request body"),
                )
                .arg(
                    Arg::new("content-type")
                        .long("content-type")
                        .help("Content type of the body"),
                ),
        )
        .subcommand(Command::new("cache").about("List cached resources"))
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<CompanionConfig> {
    match path {
        Some(path) => CompanionConfig::load(path)
            .with_context(|| format!("loading {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            CompanionConfig::load(Path::new(DEFAULT_CONFIG)).context("loading archops.toml")
        }
        None => Ok(CompanionConfig::new().apply_env()),
    }
}

fn workspace(matches: &ArgMatches) -> anyhow::Result<PathBuf> {
    match matches.get_one::<PathBuf>("workspace") {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("resolving current directory"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let format = if matches.get_flag("log-json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    telemetry::init(format)?;

    let config = load_config(matches.get_one::<PathBuf>("config"))?;
    let workspace = workspace(&matches)?;

    match matches.subcommand() {
        Some(("sign", args)) => {
            let method = args.get_one::<String>("method").map_or("GET", String::as_str);
            let path = args.get_one::<String>("path").map_or("/", String::as_str);
            let body = match args.get_one::<PathBuf>("body") {
                Some(file) => Some(
                    std::fs::read(file).with_context(|| format!("reading {}", file.display()))?,
                ),
                None => None,
            };
            let content_type = args.get_one::<String>("content-type").map(String::as_str);
            for line in commands::sign(&config, method, path, body.as_deref(), content_type)? {
                println!("{line}");
            }
        }
        Some(("cache", _)) => {
            for key in commands::cached_keys(&config, &workspace).await? {
                println!("{key}");
            }
        }
        Some((name, args)) => {
            let session = Session::open(&config, &workspace).await?;
            match name {
                "tree" => {
                    let catalog = args
                        .get_one::<String>("catalog")
                        .map_or(CatalogKind::Architecture, |c| CatalogKind::from_name(c));
                    let depth = args.get_one::<usize>("depth").copied().unwrap_or(2);
                    for line in session.tree(catalog, depth).await {
                        println!("{line}");
                    }
                }
                "content" => {
                    let reference = args.get_one::<String>("reference").map_or("", String::as_str);
                    match session.content(reference).await {
                        Some(text) => println!("{text}"),
                        None => anyhow::bail!("no copy of {reference} available"),
                    }
                }
                "install" => {
                    let reference = args.get_one::<String>("reference").map_or("", String::as_str);
                    match session.install(reference).await? {
                        Some(path) => println!("installed {}", path.display()),
                        None => anyhow::bail!("{reference} is not an installable catalog entry"),
                    }
                }
                other => anyhow::bail!("unknown command {other}"),
            }
        }
        None => anyhow::bail!("no command given"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn tree_defaults() {
        let matches = cli().try_get_matches_from(["archops", "tree"]).unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(
            args.get_one::<String>("catalog").map(String::as_str),
            Some("architecture")
        );
        assert_eq!(args.get_one::<usize>("depth"), Some(&2));
    }

    #[test]
    fn unknown_catalog_is_rejected() {
        assert!(cli()
            .try_get_matches_from(["archops", "tree", "--catalog", "nope"])
            .is_err());
    }

    #[test]
    fn global_options_follow_subcommand() {
        let matches = cli()
            .try_get_matches_from(["archops", "cache", "--workspace", "/tmp/ws"])
            .unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("workspace"),
            Some(&PathBuf::from("/tmp/ws"))
        );
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archops.toml");
        std::fs::write(&path, "[api]\nurl = \"https://arch.example.com/\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.api.base_url(), "https://arch.example.com");
    }
}
