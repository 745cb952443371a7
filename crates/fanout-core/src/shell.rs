//! Remote command lines built by the engine
//!
//! Every path is single-quoted so the remote shell never expands it.

/// Quote `arg` for a POSIX shell
#[must_use]
pub fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r#"'"'"'"#))
}

/// Join a remote directory and a file name with exactly one `/`
#[must_use]
pub fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Create `dest` and unpack a gzip tarball into it
#[must_use]
pub fn extract_archive(archive: &str, dest: &str) -> String {
    format!(
        "mkdir -p {dest} && tar -xzf {archive} -C {dest}",
        dest = quote(dest),
        archive = quote(archive)
    )
}

#[must_use]
pub fn remove_file(path: &str) -> String {
    format!("rm -f {}", quote(path))
}

#[must_use]
pub fn make_executable(path: &str) -> String {
    format!("chmod +x {}", quote(path))
}

/// `<interpreter> <script> [args]`, with `args` passed through verbatim
#[must_use]
pub fn run_script(interpreter: &str, script: &str, args: Option<&str>) -> String {
    let mut line = format!("{} {}", quote(interpreter), quote(script));
    if let Some(args) = args.map(str::trim).filter(|a| !a.is_empty()) {
        line.push(' ');
        line.push_str(args);
    }
    line
}
