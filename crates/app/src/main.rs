fn main() {
    if let Err(err) = robot_bridge::cli::handle_commands(std::env::args().collect()) {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}
