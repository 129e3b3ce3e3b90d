#![allow(dead_code)]
//! A tiny markup compiler used by the integration tests.
//!
//! It understands `{{ var }}`, `{{ var|filter }}`, `{{ super() }}`,
//! `{% extends "name" %}` and non-nested `{% block name %}...{% endblock %}`.
//! Inheritance is flattened by compiling the parent through the environment.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kiln::{
    Environment, Error, ErrorKind, Instruction, Instructions, MemoryLoader, Module, Procedure,
};

fn target<'a>(
    root: &'a mut Instructions,
    current: &'a mut Option<(String, Instructions)>,
) -> &'a mut Instructions {
    match current {
        Some((_, instrs)) => instrs,
        None => root,
    }
}

fn syntax_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::CompileError, msg)
}

pub fn compile(_name: &str, source: &str, env: &Environment) -> Result<Module, Error> {
    let mut rest = source;
    let mut extends = None;
    let mut root = Instructions::new();
    let mut blocks = Vec::new();
    let mut current: Option<(String, Instructions)> = None;

    while !rest.is_empty() {
        let idx = match (rest.find("{{"), rest.find("{%")) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => rest.len(),
        };
        if idx > 0 {
            target(&mut root, &mut current).add(Instruction::EmitRaw(rest[..idx].to_string()));
        }
        rest = &rest[idx..];
        if rest.is_empty() {
            break;
        }

        let is_var = rest.starts_with("{{");
        let end = rest
            .find(if is_var { "}}" } else { "%}" })
            .ok_or_else(|| syntax_error("unclosed tag"))?;
        let tag = rest[2..end].trim();
        rest = &rest[end + 2..];

        if is_var {
            let instrs = target(&mut root, &mut current);
            if tag == "super()" {
                instrs.add(Instruction::FastSuper);
                continue;
            }
            let mut parts = tag.split('|').map(|x| x.trim());
            instrs.add(Instruction::Lookup(parts.next().unwrap_or_default().to_string()));
            for filter in parts {
                instrs.add(Instruction::ApplyFilter(filter.to_string(), 0));
            }
            instrs.add(Instruction::Emit);
            continue;
        }

        let mut words = tag.split_whitespace();
        match words.next() {
            Some("extends") => {
                let parent = words.next().ok_or_else(|| syntax_error("missing parent"))?;
                extends = Some(parent.trim_matches('"').to_string());
            }
            Some("block") => {
                if current.is_some() {
                    return Err(syntax_error("nested blocks are not supported"));
                }
                let name = words.next().ok_or_else(|| syntax_error("missing block name"))?;
                root.add(Instruction::CallBlock(name.to_string()));
                current = Some((name.to_string(), Instructions::new()));
            }
            Some("endblock") => {
                blocks.push(current.take().ok_or_else(|| syntax_error("stray endblock"))?);
            }
            _ => return Err(syntax_error("unknown tag")),
        }
    }

    if current.is_some() {
        return Err(syntax_error("unclosed block"));
    }

    let mut module = Module::new();
    for (name, instrs) in blocks {
        module.add_block(&name, Procedure::from_instructions(instrs));
    }
    match extends {
        Some(parent) => {
            let tmpl = env.get_template(&parent)?;
            let parent_module = compile(&parent, tmpl.source(), env)?;
            for (name, procedure) in parent_module.exports() {
                module.add_export(name, procedure.clone());
            }
        }
        None => module.set_root(Procedure::from_instructions(root)),
    }
    Ok(module)
}

/// Creates an environment backed by a memory loader with the given templates.
pub fn memory_env(templates: &[(&str, &str)]) -> (Environment, MemoryLoader) {
    let loader = MemoryLoader::new();
    for (name, source) in templates {
        loader.add_template(*name, *source);
    }
    let mut env = Environment::with_loaders([loader.clone()]);
    env.set_compiler(compile);
    (env, loader)
}

/// Wraps [`compile`] so that invocations can be counted.
pub fn counting_compiler(
    counter: Arc<AtomicUsize>,
) -> impl Fn(&str, &str, &Environment) -> Result<Module, Error> + Send + Sync + 'static {
    move |name: &str, source: &str, env: &Environment| -> Result<Module, Error> {
        counter.fetch_add(1, Ordering::SeqCst);
        compile(name, source, env)
    }
}
