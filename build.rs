//! Build script rendering manual pages for `wireline` and its subcommands.
//!
//! Pages land in `$WIRELINE_MAN_DIR`, or `target/generated-man` when unset.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

const MAN_DIR_VAR: &str = "WIRELINE_MAN_DIR";

fn render(cmd: Command, title: &str, out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf: Vec<u8> = Vec::new();
    Man::new(cmd).title(title).render(&mut buf)?;
    fs::write(out_dir.join(format!("{title}.1")), buf)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed={MAN_DIR_VAR}");

    let out_dir = env::var_os(MAN_DIR_VAR)
        .map_or_else(|| PathBuf::from("target/generated-man"), PathBuf::from);
    fs::create_dir_all(&out_dir)?;

    let cmd = cli::Cli::command();
    let name = cmd.get_name().to_owned();
    for sub in cmd.get_subcommands() {
        let title = format!("{name}-{}", sub.get_name());
        render(sub.clone(), &title, &out_dir)?;
    }
    render(cmd, &name, &out_dir)
}
