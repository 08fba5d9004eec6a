// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("mdl-setup")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Install and configure the mdl server")
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .help("mdl installation directory (default: current directory)"),
        )
        .arg(
            Arg::new("config_dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .action(ArgAction::Append)
                .help("Configuration directory; repeat for several, the first is primary"),
        )
        .arg(
            Arg::new("systemd_dir")
                .long("systemd-dir")
                .default_value("/etc/systemd/system")
                .help("systemd unit directory"),
        )
        .arg(
            Arg::new("python")
                .long("python")
                .default_value("python3")
                .help("Python interpreter to check"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("mdl-setup.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
