use anyhow::Result;

fn main() -> Result<()> {
    rug::cli::run()
}
