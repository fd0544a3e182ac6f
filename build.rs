fn main() {
    // Collects build-time metadata (version, git commit) into OUT_DIR/built.rs
    built::write_built_file().expect("Failed to acquire build-time information");
}
