use hook_keeper_cli::run_cli;

fn main() {
    if let Err(e) = run_cli() {
        eprintln!("error: {}", e);
        std::process::exit(e.exit_code());
    }
}
