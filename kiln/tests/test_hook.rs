mod common;

use std::cell::RefCell;

use serde_json::json;
use similar_asserts::assert_eq;

use kiln::{ErrorKind, RenderHook};

use common::memory_env;

#[test]
fn test_render_with_layers() {
    let (env, _loader) = memory_env(&[(
        "profile.html",
        "{{ site }}: {{ user }} ({{ role }}){{ _locals }}",
    )]);
    let mut hook = RenderHook::new(&env);
    hook.set_default("site", "Example");
    hook.set_default("user", "nobody");
    hook.set_default("role", "guest");

    let data = json!({
        "_locals": {"user": "session-user", "role": "member"},
        "user": "peter",
    });
    let output = RefCell::new(None);
    hook.render("profile.html", &data, |rv| {
        *output.borrow_mut() = Some(rv);
    });
    let rv = output.into_inner().unwrap().unwrap();
    assert_eq!(rv, "Example: peter (member)");
}

#[test]
fn test_errors_are_reported_to_callback() {
    let (env, _loader) = memory_env(&[("broken.html", "{% block %}")]);
    let hook = env.render_hook();
    assert!(hook.defaults().is_empty());

    let mut kinds = Vec::new();
    hook.render("missing.html", &json!({}), |rv| {
        kinds.push(rv.unwrap_err().kind());
    });
    hook.render("broken.html", &json!({}), |rv| {
        kinds.push(rv.unwrap_err().kind());
    });
    hook.render("broken.html", &json!("not a map"), |rv| {
        kinds.push(rv.unwrap_err().kind());
    });
    assert_eq!(
        kinds,
        vec![
            ErrorKind::TemplateNotFound,
            ErrorKind::CompileError,
            ErrorKind::BadSerialization,
        ]
    );
}

#[test]
fn test_render_to_string() {
    let (env, _loader) = memory_env(&[("plain.txt", "{{ greeting }}, {{ name }}")]);
    let mut hook = RenderHook::new(&env);
    hook.set_default("greeting", "Hello");
    let rv = hook
        .render_to_string("plain.txt", &json!({"name": "World"}))
        .unwrap();
    assert_eq!(rv, "Hello, World");
    let rv = hook
        .render_to_string("plain.txt", &serde_json::Value::Null)
        .unwrap();
    assert_eq!(rv, "Hello, ");
}

#[test]
fn test_error_rendering() {
    let (env, _loader) = memory_env(&[]);
    let hook = RenderHook::new(&env);
    let err = hook.render_to_string("gone.html", &json!({})).unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @r###"template not found: template "gone.html" does not exist"###
    );
}
