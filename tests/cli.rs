use predicates::prelude::*;

fn publine(home: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("publine");
    cmd.env_remove("PUBLINE_HOME")
        .env_remove("PUBLINE_LOG")
        .env("PUBLINE_WEASYPRINT_BIN", home.join("no-weasyprint"))
        .arg("--home")
        .arg(home);
    cmd
}

#[test]
fn init_add_and_publish_end_to_end() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let home = temp.path();

    publine(home)
        .args(["init", "--title", "Night Train", "--author", "Ann", "--copyright", "2024"])
        .assert()
        .success()
        .stdout("night-train\n");

    let source = home.join("one.txt");
    std::fs::write(&source, "It was cold.\n\nThe train was late.")?;
    publine(home)
        .args(["chapter", "add", "--project", "night-train", "--number", "1"])
        .args(["--title", "Departure", "--format", "txt", "--source"])
        .arg(&source)
        .assert()
        .success();
    publine(home)
        .args(["chapter", "add", "--project", "night-train", "--number", "2", "--title", "Arrival"])
        .assert()
        .success();
    publine(home)
        .args(["chapter", "edit", "--project", "night-train", "--number", "2", "--draft", "true"])
        .assert()
        .success();

    publine(home)
        .args(["chapter", "list", "--project", "night-train"])
        .assert()
        .success()
        .stdout("1\tDeparture\n2\tArrival\t[draft]\n");

    publine(home)
        .args(["publish", "--project", "night-train", "--target", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("html: ok"))
        .stdout(predicate::str::contains("epub: ok"))
        .stdout(predicate::str::contains("pdf: ok: disabled in preferences"));

    let project = home.join("projects").join("night-train");
    let page = std::fs::read_to_string(project.join("public/chapter/1.html"))?;
    assert!(page.contains("<p>The train was late.</p>"));
    assert!(project.join("public/downloads/night_train.epub").is_file());
    assert!(!project.join("public/chapter/2.html").exists());
    Ok(())
}

#[test]
fn layout_set_then_show() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let home = temp.path();
    publine(home)
        .args(["init", "--title", "Layouts", "--author", "Ann", "--copyright", "2024"])
        .assert()
        .success();

    publine(home)
        .args(["layout", "set", "--project", "layouts", "--format", "pdf"])
        .args(["--feature", "page_size=Letter", "--feature", "add_page_numbers=off"])
        .assert()
        .success();
    publine(home)
        .args(["layout", "show", "--project", "layouts", "--format", "pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("page_size = Letter\n"))
        .stdout(predicate::str::contains("add_page_numbers = false\n"))
        .stdout(predicate::str::contains("include_title = true\n"));

    publine(home)
        .args(["layout", "set", "--project", "layouts", "--format", "html"])
        .args(["--feature", "no_such_toggle=true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown html layout feature"));
    Ok(())
}

#[test]
fn publish_fails_when_pdf_engine_is_missing() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let home = temp.path();
    publine(home)
        .args(["init", "--title", "Printed", "--author", "Ann", "--copyright", "2024"])
        .assert()
        .success();
    publine(home)
        .args(["project", "set", "--project", "printed", "--pdf-enabled", "true"])
        .assert()
        .success();

    publine(home)
        .args(["publish", "--project", "printed", "--target", "pdf"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("pdf: FAILED"))
        .stderr(predicate::str::contains("publishing printed failed"));
    Ok(())
}

#[test]
fn project_set_list_show_and_delete() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let home = temp.path();
    publine(home)
        .args(["init", "--title", "Either/Or", "--author", "Søren", "--copyright", "1843"])
        .assert()
        .success()
        .stdout("eitheror\n");

    let cover = home.join("cover.jpg");
    std::fs::write(&cover, b"jpeg")?;
    publine(home)
        .args(["project", "set", "--project", "eitheror", "--pdf-enabled", "true"])
        .args(["--license", "CC-BY-NC-SA-4.0", "--site-url", "https://example.com/either"])
        .arg("--cover-image")
        .arg(&cover)
        .assert()
        .success();

    publine(home)
        .args(["project", "show", "--project", "eitheror"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pdf_enabled = true\n"))
        .stdout(predicate::str::contains("cover_image = cover.jpg\n"))
        .stdout(predicate::str::contains("license = CC-BY-NC-SA-4.0\n"))
        .stdout(predicate::str::contains("site_url = https://example.com/either\n"));
    assert!(home.join("projects/eitheror/includes/cover.jpg").is_file());

    publine(home)
        .args(["project", "list"])
        .assert()
        .success()
        .stdout("eitheror\tEither/Or\tSøren\n");

    publine(home)
        .args(["project", "delete", "--project", "eitheror"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("without --yes"));
    publine(home)
        .args(["project", "delete", "--project", "eitheror", "--yes"])
        .assert()
        .success();
    assert!(!home.join("projects/eitheror").exists());
    Ok(())
}

#[test]
fn slash_in_title_publishes_into_downloads() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let home = temp.path();
    publine(home)
        .args(["init", "--title", "Either/Or", "--author", "Ann", "--copyright", "2024"])
        .assert()
        .success();
    publine(home)
        .args(["chapter", "add", "--project", "eitheror", "--number", "1", "--title", "One"])
        .assert()
        .success();
    std::fs::write(
        home.join("projects/eitheror/includes/chapter_1.html"),
        "<p>one</p>",
    )?;

    publine(home)
        .args(["publish", "--project", "eitheror", "--target", "epub"])
        .assert()
        .success()
        .stdout(predicate::str::contains("epub: ok"));
    assert!(home.join("projects/eitheror/public/downloads/eitheror.epub").is_file());
    Ok(())
}

#[test]
fn unknown_project_is_an_error() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    publine(temp.path())
        .args(["publish", "--project", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project not found"));
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    publine(temp.path())
        .env("RUST_LOG", "debug")
        .args(["init", "--title", "Debugging", "--author", "Ann", "--copyright", "2024"])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}
