fn main() {
    if let Err(err) = roadmap_grid::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
