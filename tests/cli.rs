use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

#[test]
fn help_lists_subcommands() -> Result<()> {
    cargo_run!("picsearch", "--help")
        .success()
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("server"));
    Ok(())
}

#[test]
fn show_on_empty_config() -> Result<()> {
    let conf_dir = tempfile::TempDir::new()?;

    cargo_run!("picsearch", "-c", conf_dir.path(), "show")
        .success()
        .stdout(predicate::str::contains("尚未创建任何照片库"));
    Ok(())
}

#[test]
fn search_without_library_fails() -> Result<()> {
    let conf_dir = tempfile::TempDir::new()?;

    // show 先初始化数据库，随后的搜索因为没有照片库而报错
    cargo_run!("picsearch", "-c", conf_dir.path(), "show").success();
    cargo_run!("picsearch", "-c", conf_dir.path(), "search", "a cat").failure();
    Ok(())
}
