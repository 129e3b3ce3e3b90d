mod common;

use std::sync::Arc;

use similar_asserts::assert_eq;

use kiln::value::ValueMap;
use kiln::{
    context, BlockMap, BlockStack, Context, Environment, Error, ErrorKind, Module, Procedure,
};

use common::memory_env;

const BASE: &str = "<title>{% block title %}Base{% endblock %}</title>\
                    <body>{% block body %}root{% endblock %}</body>";
const MID: &str = "{% extends \"base.html\" %}\
                   {% block body %}{{ super() }}+mid{% endblock %}";
const CHILD: &str = "{% extends \"mid.html\" %}\
                     {% block body %}{{ super() }}+child{% endblock %}\
                     {% block title %}{{ title }}{% endblock %}";

#[test]
fn test_three_level_chain() {
    let (env, _loader) = memory_env(&[
        ("base.html", BASE),
        ("mid.html", MID),
        ("child.html", CHILD),
    ]);
    let rv = env
        .get_template("child.html")
        .unwrap()
        .render(context!(title => "Hello"))
        .unwrap();
    assert_eq!(rv, "<title>Hello</title><body>root+mid+child</body>");

    let rv = env.get_template("mid.html").unwrap().render(()).unwrap();
    assert_eq!(rv, "<title>Base</title><body>root+mid</body>");

    let rv = env.get_template("base.html").unwrap().render(()).unwrap();
    assert_eq!(rv, "<title>Base</title><body>root</body>");
}

#[test]
fn test_super_without_parent_body() {
    let (env, _loader) = memory_env(&[(
        "lonely.html",
        "{% block body %}[{{ super() }}]{% endblock %}",
    )]);
    let err = env
        .get_template("lonely.html")
        .unwrap()
        .render(())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuperBlock);
    assert_eq!(
        err.to_string(),
        "no super block: block \"body\" has no parent body (in lonely.html)"
    );
}

#[test]
fn test_super_outside_of_block() {
    let (env, _loader) = memory_env(&[("top.html", "{{ super() }}")]);
    let err = env.get_template("top.html").unwrap().render(()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(err.detail(), Some("cannot super outside of block"));
}

#[test]
fn test_missing_parent() {
    let (env, _loader) = memory_env(&[(
        "orphan.html",
        "{% extends \"missing.html\" %}{% block body %}x{% endblock %}",
    )]);
    let err = env
        .get_template("orphan.html")
        .unwrap()
        .render(())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CompileError);
    insta::assert_snapshot!(format!("{:#}", err), @r###"
    compile error: template failed to compile (in orphan.html)
      caused by: template not found: template "missing.html" does not exist
    "###);
}

fn body(text: &'static str) -> Procedure {
    Procedure::new(move |state| {
        let parent = match state.render_super() {
            Ok(parent) => parent,
            Err(err) if err.kind() == ErrorKind::NoSuperBlock => String::new(),
            Err(err) => return Err(err),
        };
        Ok(format!("{}{}", parent, text))
    })
}

fn chain() -> Arc<BlockMap> {
    let mut blocks = BlockMap::new();
    blocks.insert(
        "body".into(),
        [body("+child"), body("+parent"), body("grandparent")]
            .into_iter()
            .collect::<BlockStack>(),
    );
    Arc::new(blocks)
}

#[test]
fn test_override_resolution() {
    let env = Environment::empty();
    let ctx = Context::new(ValueMap::new(), chain());

    let child = ctx.get_block("body").unwrap();
    assert_eq!(child.depth(), 0);
    assert_eq!(child.render(&env, &ctx).unwrap(), "grandparent+parent+child");

    let parent = ctx.get_super(&env, &child).unwrap();
    assert_eq!(parent.call().unwrap(), "grandparent+parent");

    let grandparent = ctx.get_super(&env, &parent.block()).unwrap();
    assert_eq!(grandparent.call().unwrap(), "grandparent");

    let err = ctx.get_super(&env, &grandparent.block()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuperBlock);

    assert_eq!(
        ctx.get_block("footer").unwrap_err().kind(),
        ErrorKind::UnknownBlock
    );
}

#[test]
fn test_render_block_from_root() {
    let blocks = chain();
    let mut env = Environment::empty();
    env.set_compiler(move |_: &str, _: &str, _: &Environment| -> Result<Module, Error> {
        let mut module = Module::new().with_root(Procedure::new(|state| {
            Ok(format!(
                "<{}>{}",
                state.current_block().unwrap_or("root"),
                state.render_block("body")?
            ))
        }));
        for (name, stack) in blocks.iter() {
            for idx in 0..stack.len() {
                if let Some(procedure) = stack.get(idx) {
                    module.add_block(name, procedure.clone());
                }
            }
        }
        Ok(module)
    });
    let tmpl = env.template_from_named_str("page.html", "");
    assert_eq!(tmpl.render(()).unwrap(), "<root>grandparent+parent+child");
}

#[test]
fn test_unknown_block_in_render() {
    let (mut env, _loader) = memory_env(&[("base.html", BASE)]);
    env.set_compiler(|_: &str, _: &str, _: &Environment| -> Result<Module, Error> {
        Ok(Module::new().with_root(Procedure::new(|state| state.render_block("sidebar"))))
    });
    let err = env.get_template("base.html").unwrap().render(()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownBlock);
    assert_eq!(err.name(), Some("base.html"));
}
