//! Integration tests for listing references with for-each-ref.

mod common;

use common::TestRepo;
use gitpipe::foreachref::{list_refs, Format, RefQuery};
use gitpipe::gitcmd::Context;

fn repo_with_refs() -> TestRepo {
    let repo = TestRepo::new();
    repo.create_branch("feature");
    repo.create_tag("v1.0", "first release");
    repo
}

#[test]
fn lists_branches_and_tags() {
    let repo = repo_with_refs();
    let format = Format::new(["refname:short", "objecttype", "objectname"]);
    let refs = list_refs(
        &repo.env(),
        &Context::background(),
        repo.path(),
        &format,
        &RefQuery::default(),
    )
    .unwrap();

    let names: Vec<_> = refs.iter().map(|r| r.get("refname:short").unwrap()).collect();
    assert_eq!(names, ["feature", "main", "v1.0"]);

    let tag = &refs[2];
    assert_eq!(tag.get("objecttype"), Some("tag"));
    assert_eq!(tag.get("objectname").unwrap(), repo.rev_parse("v1.0"));
    assert_eq!(refs[1].get("objecttype"), Some("commit"));
    assert_eq!(refs[1].get("objectname").unwrap(), repo.rev_parse("main"));
}

#[test]
fn patterns_filter_references() {
    let repo = repo_with_refs();
    let query = RefQuery {
        patterns: vec!["refs/tags/".to_string()],
        ..Default::default()
    };
    let refs = list_refs(
        &repo.env(),
        &Context::background(),
        repo.path(),
        &Format::new(["refname"]),
        &query,
    )
    .unwrap();

    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].get("refname"), Some("refs/tags/v1.0"));
}

#[test]
fn no_matching_refs_is_empty() {
    let repo = repo_with_refs();
    let query = RefQuery {
        patterns: vec!["refs/nothing-here/".to_string()],
        ..Default::default()
    };
    let refs = list_refs(
        &repo.env(),
        &Context::background(),
        repo.path(),
        &Format::new(["refname:short"]),
        &query,
    )
    .unwrap();
    assert!(refs.is_empty());
}

#[test]
fn sort_and_count() {
    let repo = repo_with_refs();
    let query = RefQuery {
        sort: Some("-refname".to_string()),
        count: Some(2),
        ..Default::default()
    };
    let refs = list_refs(
        &repo.env(),
        &Context::background(),
        repo.path(),
        &Format::new(["refname:short"]),
        &query,
    )
    .unwrap();

    let names: Vec<_> = refs.iter().map(|r| r.get("refname:short").unwrap()).collect();
    assert_eq!(names, ["v1.0", "main"]);
}

#[test]
fn empty_field_value_is_kept() {
    let repo = repo_with_refs();
    let query = RefQuery {
        patterns: vec!["refs/heads/main".to_string()],
        ..Default::default()
    };
    let refs = list_refs(
        &repo.env(),
        &Context::background(),
        repo.path(),
        &Format::new(["refname", "upstream", "subject"]),
        &query,
    )
    .unwrap();

    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].get("upstream"), Some(""));
    assert_eq!(refs[0].get("subject"), Some("Initial commit"));
}

#[test]
fn option_like_pattern_is_rejected() {
    let repo = repo_with_refs();
    let env = repo.env();
    let query = RefQuery {
        patterns: vec!["--contains=HEAD".to_string()],
        ..Default::default()
    };
    let err = list_refs(
        &env,
        &Context::background(),
        repo.path(),
        &Format::new(["refname"]),
        &query,
    )
    .unwrap_err();
    assert!(err.to_string().contains("--contains=HEAD"), "unexpected error: {err}");
    assert!(env.processes().is_empty());
}
