use std::path::Path;

use color_eyre::eyre::Result;

pub fn run(root: &Path) -> Result<()> {
    if !root.is_dir() {
        println!("FAIL simconf doctor");
        println!("root '{}' is not a directory", root.display());
        std::process::exit(1);
    }

    let mut components = 0usize;
    let mut documents = 0usize;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            components += 1;
            documents += count_documents(&path)?;
        } else if is_document(&path) {
            documents += 1;
        }
    }

    println!("OK   simconf doctor");
    println!("version: {}", simconf_core::version());
    println!("root: {}", root.display());
    println!("components: {components}");
    println!("documents: {documents}");
    Ok(())
}

fn count_documents(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_document(&path) {
            count += 1;
        }
    }
    Ok(count)
}

fn is_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml" | "YAML" | "YML")
    )
}
