fn main() {
    // GIT_COMMIT_HASH and friends for `studiogate::built_info`.
    if let Err(err) = built::write_built_file() {
        panic!("Failed to acquire build-time information: {err}");
    }
}
