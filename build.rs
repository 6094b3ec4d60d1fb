// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn environment_args() -> Vec<Arg> {
    vec![
        Arg::new("modulepath")
            .long("modulepath")
            .env("MODTOOL_MODULEPATH")
            .default_value("/etc/modtool/modules")
            .help("Module search path, earliest entry wins"),
        Arg::new("target_dir")
            .long("target-dir")
            .env("MODTOOL_TARGET_DIR")
            .help("Directory for newly installed dependencies (default: first modulepath entry)"),
        Arg::new("module_repository")
            .long("module-repository")
            .env("MODTOOL_REPOSITORY")
            .default_value("https://forgeapi.puppet.com")
            .help("Module repository URL"),
        Arg::new("cache_dir")
            .long("cache-dir")
            .env("MODTOOL_CACHE_DIR")
            .default_value("/var/cache/modtool")
            .help("Cache directory for archives and release metadata"),
        Arg::new("metadata_expire")
            .long("metadata-expire")
            .default_value("3600")
            .help("Seconds before cached release metadata is refreshed"),
    ]
}

fn build_cli() -> Command {
    Command::new("modtool")
        .version(env!("CARGO_PKG_VERSION"))
        .author("modtool contributors")
        .about("Upgrade installed modules while respecting their dependents")
        .subcommand_required(true)
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Only log warnings and errors"),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Upgrade an installed module")
                .arg(Arg::new("module_name").required(true).help("Module name (author-name)"))
                .arg(
                    Arg::new("version")
                        .long("version")
                        .help("Version or requirement to upgrade to"),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Ignore local changes and reinstall even when already current"),
                )
                .arg(
                    Arg::new("ignore_dependencies")
                        .long("ignore-dependencies")
                        .action(ArgAction::SetTrue)
                        .help("Do not consider other installed modules' requirements"),
                )
                .arg(
                    Arg::new("render_as")
                        .long("render-as")
                        .value_parser(["human", "json"])
                        .default_value("human")
                        .help("Output format"),
                )
                .args(environment_args()),
        )
        .subcommand(
            Command::new("list")
                .about("List installed modules by modulepath entry")
                .args(environment_args()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell to generate completions for"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("modtool.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
