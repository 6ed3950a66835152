use std::env;
use std::error::Error;
use std::process::Command;

use simple_error::bail;
use vergen::EmitBuilder;

fn exec_git(args: &[&str]) -> Result<String, Box<dyn Error>> {
    let output = Command::new("git").args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} exited with error: {}", args.join(" "), stderr.trim());
    }
    let stdout = String::from_utf8(output.stdout)?;
    Ok(stdout.trim().to_string())
}

fn main() -> Result<(), Box<dyn Error>> {
    EmitBuilder::builder().all_build().all_rustc().emit()?;

    let version = match exec_git(&["describe", "--tags"]) {
        Ok(version) if !version.is_empty() => version,
        _ => format!("v{}", env::var("CARGO_PKG_VERSION")?),
    };
    let sha = exec_git(&["rev-parse", "HEAD"]).unwrap_or_else(|_| String::from("unknown"));

    let build_type = env::var("PROFILE").unwrap_or_else(|_| String::from("unknown"));
    let build_target = env::var("TARGET").unwrap_or_else(|_| String::from("unknown"));

    println!("cargo:rustc-env=BUILD_VERSION={version}");
    println!("cargo:rustc-env=BUILD_SHA={sha}");
    println!("cargo:rustc-env=BUILD_TYPE={build_type}");
    println!("cargo:rustc-env=BUILD_TARGET={build_target}");
    println!("cargo:rerun-if-changed=.git/HEAD");

    Ok(())
}
