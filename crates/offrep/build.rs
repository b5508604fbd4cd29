use vergen_gitcl::{BuildBuilder, Emitter, GitclBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let build = BuildBuilder::default().build_date(true).build()?;
    let gitcl = GitclBuilder::default().sha(true).build()?;

    let result = Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&gitcl)?
        .emit();

    // git が使えない環境（ソース tarball からのビルドなど）では CI の環境変数で補う
    if result.is_err() {
        println!("cargo::rustc-env=VERGEN_BUILD_DATE=unknown");
        match std::env::var("GITHUB_SHA") {
            Ok(sha) => println!(
                "cargo::rustc-env=VERGEN_GIT_SHA={}",
                &sha[..7.min(sha.len())]
            ),
            Err(_) => println!("cargo::rustc-env=VERGEN_GIT_SHA=unknown"),
        }
    }

    Ok(())
}
