//! blender-depot - Main entry point.
//!
//! Usage: depot [OPTIONS] <COMMAND>
//!
//! Commands:
//!   import <package.json>   Fetch a package and list its add-ons
//!   scan                    List add-ons already in the cache
//!   clear-cache             Delete fetched packages (installed add-ons stay)
//!   config                  Show the effective configuration
//!
//! Options:
//!   --version, -v           Show version
//!   --help, -h              Show help

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blender_depot::addons::{
    ConflictPolicy, GitHubClient, InstallReport, RemoteApi, format_version,
};
use blender_depot::config::Config;
use blender_depot::importer::{IMPORTER_VERSION, Importer};
use blender_depot::{Session, logging};

const USAGE: &str = "\
Usage: depot [OPTIONS] <COMMAND>

Commands:
  import <package.json>   Fetch a package and list its add-ons
  scan                    List add-ons already in the cache
  clear-cache             Delete fetched packages (installed add-ons stay)
  config                  Show the effective configuration
                          (--init writes a documented config file)

Selection (import, scan):
  --all                   Select every compatible add-on
  --select <NAME>         Select an add-on by name (repeatable)
  --install               Install the selected add-ons
  --overwrite             Replace add-ons that are already installed
  --skip                  Keep add-ons that are already installed
  --details               Show description, author and versions

Options:
  --config <PATH>         Config file (default: ~/.blender-depot/config.toml)
  --cache-dir <PATH>      Override the cache directory
  --addons-dir <PATH>     Override the Blender add-ons directory
  --blender <VERSION>     Host Blender version for compatibility checks
  --version, -v           Show version
  --help, -h              Show help
";

/// Parsed command line.
#[derive(Debug, Default)]
struct Args {
    command: Option<String>,
    manifest: Option<PathBuf>,
    config_path: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    addons_dir: Option<PathBuf>,
    blender: Option<String>,
    select: Vec<String>,
    all: bool,
    install: bool,
    details: bool,
    init: bool,
    policy: Option<ConflictPolicy>,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = raw.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config_path = Some(value(arg, &mut iter)?.into()),
            "--cache-dir" => args.cache_dir = Some(value(arg, &mut iter)?.into()),
            "--addons-dir" => args.addons_dir = Some(value(arg, &mut iter)?.into()),
            "--blender" => args.blender = Some(value(arg, &mut iter)?),
            "--select" => args.select.push(value(arg, &mut iter)?),
            "--all" => args.all = true,
            "--install" => args.install = true,
            "--details" => args.details = true,
            "--init" => args.init = true,
            "--overwrite" => args.policy = Some(ConflictPolicy::Overwrite),
            "--skip" => args.policy = Some(ConflictPolicy::Skip),
            flag if flag.starts_with('-') => return Err(format!("Unknown option: {}", flag)),
            word if args.command.is_none() => args.command = Some(word.to_string()),
            word if args.command.as_deref() == Some("import") && args.manifest.is_none() => {
                args.manifest = Some(PathBuf::from(word));
            }
            word => return Err(format!("Unexpected argument: {}", word)),
        }
    }

    Ok(args)
}

fn value(flag: &str, iter: &mut std::slice::Iter<'_, String>) -> Result<String, String> {
    iter.next()
        .cloned()
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();

    if raw.iter().any(|a| a == "--version" || a == "-v") {
        println!("blender-depot v{}", IMPORTER_VERSION);
        return ExitCode::SUCCESS;
    }
    if raw.is_empty() || raw.iter().any(|a| a == "--help" || a == "-h") {
        print!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    let config_path = args
        .config_path
        .clone()
        .unwrap_or_else(Config::default_config_path);
    let mut config = match Config::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    apply_overrides(&mut config, &args);

    if let Err(e) = logging::init(&config.log) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    match run(&config, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(ref dir) = args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(ref dir) = args.addons_dir {
        config.addons_dir = Some(dir.clone());
    }
    if let Some(ref version) = args.blender {
        config.blender_version = Some(version.clone());
    }
    if let Some(policy) = args.policy {
        config.on_conflict = policy;
    }
}

fn run(config: &Config, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let client = GitHubClient::new(&config.api_base, config.request_timeout());
    let mut importer = Importer::new(
        client,
        config.cache_dir(),
        config.addons_dir(),
        config.host_version(),
    );

    match args.command.as_deref() {
        Some("import") => {
            let manifest = args
                .manifest
                .as_ref()
                .ok_or("import requires a package file")?;
            let report = importer.import_package(manifest)?;

            for (id, err) in &report.fetch.failures {
                eprintln!("Warning: could not fetch {}: {}", id, err);
            }
            println!("Found {} addons in the package", report.discovered);
            select_and_install(&mut importer, config, args)
        }
        Some("scan") => {
            let count = importer.rescan();
            println!("Found {} addons in {}", count, importer.cache_dir().display());
            select_and_install(&mut importer, config, args)
        }
        Some("clear-cache") => {
            importer.clear_cache()?;
            println!("Cleared {}", importer.cache_dir().display());
            Ok(())
        }
        Some("config") => {
            if args.init {
                let path = args
                    .config_path
                    .clone()
                    .unwrap_or_else(Config::default_config_path);
                if Config::create_default(&path)? {
                    println!("Wrote {}", path.display());
                } else {
                    println!("{} already exists", path.display());
                }
                return Ok(());
            }
            print!("{}", config.to_toml()?);
            println!("# addons dir in effect: {}", config.addons_dir().display());
            Ok(())
        }
        Some(other) => Err(format!("Unknown command: {}", other).into()),
        None => Err("No command given".into()),
    }
}

fn select_and_install<R: RemoteApi>(
    importer: &mut Importer<R>,
    config: &Config,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = importer.session_mut();
    if args.all {
        session.select_all(true);
    }
    for name in &args.select {
        if !session.select_by_name(name) {
            eprintln!("Warning: no compatible add-on named '{}'", name);
        }
    }

    print_session(importer.session(), args.details);

    if args.install {
        let selected = importer.session().selected_count();
        if selected == 0 {
            println!("Nothing selected to install");
            return Ok(());
        }
        let report = importer.install_selected(config.on_conflict);
        print_install_report(&report, importer.addons_dir());
    }

    Ok(())
}

fn print_session(session: &Session, details: bool) {
    for entry in session.entries() {
        let info = &entry.info;
        let mark = if entry.selected { "[x]" } else { "[ ]" };
        let warning = if session.is_compatible(info) {
            ""
        } else {
            "  (Incompatible addon)"
        };
        println!("{} {}: {}{}", mark, info.category(), info.name(), warning);

        if details || entry.show_expanded {
            println!("      Description: {}", info.description());
            println!("      Author: {}", info.author());
            println!("      Version: {}", format_version(&info.version()));
            println!(
                "      Compatibility: Blender {} and above",
                format_version(&info.blender())
            );
        }
    }
}

fn print_install_report(report: &InstallReport, addons_dir: &Path) {
    println!(
        "Installed {} addon(s) into {}",
        report.installed.len(),
        addons_dir.display()
    );
    for path in &report.skipped {
        println!("Skipped {} (already installed, use --overwrite)", path.display());
    }
    for (name, err) in &report.failed {
        eprintln!("Failed to install {}: {}", name, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_import() {
        let args = parse_args(&strings(&[
            "import", "pkg.json", "--all", "--install", "--overwrite", "--select", "Widget",
        ]))
        .unwrap();

        assert_eq!(args.command.as_deref(), Some("import"));
        assert_eq!(args.manifest, Some(PathBuf::from("pkg.json")));
        assert!(args.all && args.install);
        assert_eq!(args.select, vec!["Widget".to_string()]);
        assert_eq!(args.policy, Some(ConflictPolicy::Overwrite));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&strings(&["scan", "--bogus"])).is_err());
        assert!(parse_args(&strings(&["scan", "extra"])).is_err());
        assert!(parse_args(&strings(&["import", "--config"])).is_err());
    }

    #[test]
    fn test_parse_config_init() {
        let raw = strings(&["config", "--init", "--config", "/tmp/depot.toml"]);
        let args = parse_args(&raw).unwrap();
        assert_eq!(args.command.as_deref(), Some("config"));
        assert!(args.init);
        assert_eq!(args.config_path, Some(PathBuf::from("/tmp/depot.toml")));
    }
}
