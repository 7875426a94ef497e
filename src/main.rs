fn main() {
    if let Err(e) = lorekeeper::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
