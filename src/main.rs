use clap::Parser;

fn main() {
    let cli_args = aihotkey_app_lib::CliArgs::parse();
    if let Err(e) = aihotkey_app_lib::run(cli_args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
