use crate::tree::{BoundKind, Node, NodeKind};

/// Renders the source form of a type-position expression (the `T` of
/// `new T(...)`, a cast target, a thrown type), used to size spans: the
/// width of a type reference equals the length of its rendered text.
///
/// Kinds that cannot appear in type position render as empty.
pub fn render(node: &Node) -> String {
    match &node.kind {
        NodeKind::Ident { name } => name.clone(),
        NodeKind::FieldSelect { selected, name, .. } => {
            format!("{}.{}", render(selected), name)
        }
        NodeKind::PrimitiveType { name } => name.clone(),
        NodeKind::ArrayType { elem_type } => format!("{}[]", render(elem_type)),
        NodeKind::TypeApply { class, args } => {
            let args: Vec<String> = args.iter().map(render).collect();
            format!("{}<{}>", render(class), args.join(","))
        }
        NodeKind::TypeUnion { alternatives } => {
            let alts: Vec<String> = alternatives.iter().map(render).collect();
            alts.join(" | ")
        }
        NodeKind::TypeIntersection { bounds } => {
            let bounds: Vec<String> = bounds.iter().map(render).collect();
            bounds.join(" & ")
        }
        NodeKind::AnnotatedType { underlying, .. } => render(underlying),
        NodeKind::Wildcard { kind, inner } => match (kind, inner) {
            (BoundKind::Extends, Some(inner)) => format!("? extends {}", render(inner)),
            (BoundKind::Super, Some(inner)) => format!("? super {}", render(inner)),
            _ => "?".to_string(),
        },
        NodeKind::Literal { text } => text.clone(),
        _ => String::new(),
    }
}
