fn main() {
    mapling::cli::run();
}
