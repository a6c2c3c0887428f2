//! Per-handler facts: the prompt a handler sends and the model behind it.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::extract::ast::{ExprKind, SourceTree};

/// Constructor keywords that name the model a client instance talks to.
pub const MODEL_KEYWORDS: [&str; 3] = ["model", "model_name", "repo_id"];

const INVOKE: &str = "invoke";
const HUMAN_MESSAGE: &str = "HumanMessage";

/// Instance name -> model identifier, from top-level
/// `name = Client(model="...")` assignments. Later bindings win.
pub fn model_bindings(tree: &SourceTree) -> HashMap<String, String> {
    let mut bindings = HashMap::new();
    for assign in tree.call_assignments() {
        let Some(call) = assign.value.as_call() else {
            continue;
        };
        for kw in &call.keywords {
            let Some(arg) = kw.arg.as_deref() else {
                continue;
            };
            if !MODEL_KEYWORDS.contains(&arg) {
                continue;
            }
            if let Some(model) = kw.value.literal() {
                for target in &assign.targets {
                    bindings.insert(target.clone(), model.to_string());
                }
            }
        }
    }
    bindings
}

/// The text of the first human message passed to an `invoke` call inside
/// `body`, either directly or in a list literal. Empty when there is none.
pub fn prompt_of(tree: &SourceTree, body: Node<'_>) -> String {
    for call in tree.calls_in(body) {
        if call.method() != Some(INVOKE) {
            continue;
        }
        for arg in &call.args {
            let messages = match &arg.kind {
                ExprKind::List(elts) => elts.iter().collect::<Vec<_>>(),
                _ => vec![arg],
            };
            for message in messages {
                let Some(msg) = message.as_call() else {
                    continue;
                };
                if msg.callee() != Some(HUMAN_MESSAGE) {
                    continue;
                }
                let content = msg.keyword("content").or_else(|| msg.args.first());
                if let Some(text) = content.and_then(|c| c.rendered_text()) {
                    return text;
                }
            }
        }
    }
    String::new()
}

/// The model bound to the receiver of the first `<name>.invoke(...)` call in
/// `body`. Empty when the receiver has no binding.
pub fn model_of(tree: &SourceTree, body: Node<'_>, bindings: &HashMap<String, String>) -> String {
    tree.calls_in(body)
        .iter()
        .filter(|call| call.method() == Some(INVOKE))
        .find_map(|call| call.receiver())
        .map(|name| bindings.get(name).cloned().unwrap_or_default())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_facts(src: &str, name: &str) -> (String, String) {
        let tree = SourceTree::parse(src).unwrap();
        let bindings = model_bindings(&tree);
        let def = tree
            .functions()
            .into_iter()
            .find(|f| f.name == name)
            .unwrap();
        (prompt_of(&tree, def.node), model_of(&tree, def.node, &bindings))
    }

    #[test]
    fn bindings_accept_all_model_keywords() {
        let src = "\
a = ChatOpenAI(model=\"gpt-4o\")
b = HuggingFaceEndpoint(repo_id=\"org/model\")
c = c2 = Legacy(model_name='m')
d = Client(model=MODEL)
e = Client(temperature=0.2, model=7)
";
        let tree = SourceTree::parse(src).unwrap();
        let b = model_bindings(&tree);
        assert_eq!(b["a"], "gpt-4o");
        assert_eq!(b["b"], "org/model");
        assert_eq!(b["c2"], "m");
        assert!(!b.contains_key("d"));
        assert_eq!(b["e"], "7");
    }

    #[test]
    fn prompt_from_message_list() {
        let src = "\
llm = ChatOpenAI(model='gpt-4o-mini')

def start(state):
    reply = llm.invoke([SystemMessage(content='sys'), HumanMessage(content=f\"Summarize {state['text']}\")])
    return reply
";
        let (prompt, model) = handler_facts(src, "start");
        assert_eq!(prompt, "Summarize {state['text']}");
        assert_eq!(model, "gpt-4o-mini");
    }

    #[test]
    fn prompt_from_positional_message() {
        let src = "\
def step(state):
    return client.invoke(messages.HumanMessage('plain text'))
";
        let (prompt, model) = handler_facts(src, "step");
        assert_eq!(prompt, "plain text");
        // `client` has no binding
        assert_eq!(model, "");
    }

    #[test]
    fn non_literal_content_is_skipped() {
        let src = "\
def step(state):
    chain.invoke(HumanMessage(content=build()))
    chain.invoke([HumanMessage(content='second')])
";
        let (prompt, _) = handler_facts(src, "step");
        assert_eq!(prompt, "second");
    }

    #[test]
    fn handler_without_invoke_is_empty() {
        let (prompt, model) = handler_facts("def noop(state):\n    return state\n", "noop");
        assert_eq!(prompt, "");
        assert_eq!(model, "");
    }
}
