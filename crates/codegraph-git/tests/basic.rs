use codegraph_git::GitRepository;
use std::fs;
use tempfile::tempdir;

fn write_file<P: AsRef<std::path::Path>>(p: P, content: &str) {
    fs::create_dir_all(p.as_ref().parent().unwrap()).unwrap();
    fs::write(p, content).unwrap();
}

#[test]
fn open_finds_an_existing_repo() {
    let dir = tempdir().unwrap();
    GitRepository::init(dir.path()).unwrap();
    let opened = GitRepository::open(dir.path()).unwrap();
    assert_eq!(opened.workdir(), Some(dir.path()));
}

#[test]
fn open_rejects_a_non_repo_directory() {
    let dir = tempdir().unwrap();
    assert!(GitRepository::open(dir.path()).is_err());
}

#[test]
fn clone_at_commit_checks_out_the_requested_sha() {
    let origin_dir = tempdir().unwrap();
    let origin = GitRepository::init(origin_dir.path()).unwrap();
    let sig = git2::Signature::now("Tester", "tester@example.com").unwrap();

    write_file(origin_dir.path().join("a.txt"), "v1");
    let mut index = origin.repository().index().unwrap();
    index.add_path(std::path::Path::new("a.txt")).unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = origin.repository().find_tree(tree_id).unwrap();
    let first_commit = origin.repository().commit(Some("HEAD"), &sig, &sig, "v1", &tree, &[]).unwrap();

    write_file(origin_dir.path().join("a.txt"), "v2");
    let mut index = origin.repository().index().unwrap();
    index.add_path(std::path::Path::new("a.txt")).unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = origin.repository().find_tree(tree_id).unwrap();
    let head = origin.repository().find_commit(first_commit).unwrap();
    origin.repository().commit(Some("HEAD"), &sig, &sig, "v2", &tree, &[&head]).unwrap();

    let clone_dir = tempdir().unwrap();
    let dest = clone_dir.path().join("checkout");
    let cloned = GitRepository::clone_at_commit(
        origin_dir.path().to_str().unwrap(),
        &dest,
        &first_commit.to_string(),
    )
    .unwrap();

    let content = fs::read_to_string(dest.join("a.txt")).unwrap();
    assert_eq!(content, "v1");
    assert!(cloned.repository().head().unwrap().target().is_some());
}

#[test]
fn clone_at_commit_rejects_an_unknown_sha() {
    let origin_dir = tempdir().unwrap();
    let origin = GitRepository::init(origin_dir.path()).unwrap();
    let sig = git2::Signature::now("Tester", "tester@example.com").unwrap();
    write_file(origin_dir.path().join("a.txt"), "v1");
    let mut index = origin.repository().index().unwrap();
    index.add_path(std::path::Path::new("a.txt")).unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = origin.repository().find_tree(tree_id).unwrap();
    origin.repository().commit(Some("HEAD"), &sig, &sig, "v1", &tree, &[]).unwrap();

    let clone_dir = tempdir().unwrap();
    let dest = clone_dir.path().join("checkout");
    let bogus_sha = "0".repeat(40);
    assert!(GitRepository::clone_at_commit(origin_dir.path().to_str().unwrap(), &dest, &bogus_sha).is_err());
}
