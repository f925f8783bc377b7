//! The `skald` command line interface. Three subcommands cover the whole
//! workflow: `build` renders the site, `check` lints content frontmatter
//! without rendering, and `serve` previews a generated site locally.

use std::env;
use std::path::Path;
use std::process;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use tracing_subscriber::EnvFilter;

use skald::build;
use skald::config::Config;
use skald::lint;
use skald::markdown::CmarkRenderer;
use skald::serve;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("skald: {}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("skald")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A static site generator for serialized content")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Renders the site into the output directory")
                .arg(project_arg())
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .value_name("DIR")
                        .takes_value(true)
                        .default_value("public")
                        .help("The directory to write the generated site into"),
                ),
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("Lints content frontmatter without rendering anything")
                .arg(project_arg()),
        )
        .subcommand(
            SubCommand::with_name("serve")
                .about("Serves a generated site for local preview")
                .arg(
                    Arg::with_name("dir")
                        .long("dir")
                        .value_name("DIR")
                        .takes_value(true)
                        .default_value("public")
                        .help("The directory to serve"),
                )
                .arg(
                    Arg::with_name("addr")
                        .long("addr")
                        .value_name("ADDR")
                        .takes_value(true)
                        .default_value("127.0.0.1:8080")
                        .help("The address to listen on"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("build", Some(sub)) => {
            let config = load_config(sub)?;
            build::build_site(&config, &CmarkRenderer::new())?;
            Ok(())
        }
        ("check", Some(sub)) => {
            let config = load_config(sub)?;
            let issues = lint::check_content(&config.content_dir)?;
            for issue in &issues {
                println!("{}", issue);
            }
            if !issues.is_empty() {
                process::exit(1);
            }
            Ok(())
        }
        ("serve", Some(sub)) => {
            let dir = sub.value_of("dir").unwrap_or("public");
            let addr = sub.value_of("addr").unwrap_or("127.0.0.1:8080");
            serve::serve(Path::new(dir), addr)?;
            Ok(())
        }
        _ => unreachable!("a subcommand is required"),
    }
}

fn project_arg() -> Arg<'static, 'static> {
    Arg::with_name("project")
        .long("project")
        .short("p")
        .value_name("FILE")
        .takes_value(true)
        .help("The project file (discovered from the working directory by default)")
}

fn load_config(sub: &ArgMatches) -> Result<Config, Box<dyn std::error::Error>> {
    let output_dir = Path::new(sub.value_of("output").unwrap_or("public"));
    let config = match sub.value_of("project") {
        Some(path) => Config::from_project_file(Path::new(path), output_dir)?,
        None => Config::from_directory(&env::current_dir()?, output_dir)?,
    };
    Ok(config)
}
