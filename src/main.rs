fn main() {
    if let Err(err) = retail_manager::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
