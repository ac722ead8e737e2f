use syntax::{ClassSymbol, FieldSymbol, MethodSymbol};

/// Builds the string forms the downstream analysis consumes: disambiguating
/// method signatures, compact method names, field signatures, and
/// allocation base identifiers.
///
/// The scanner only decides *which* name form to feed into
/// [`allocation_id`](ReprBuilder::allocation_id); the composition itself
/// lives here so consumers can swap in their own representation.
pub trait ReprBuilder {
    /// Globally unique, overload-aware method name form.
    fn method_signature(&self, method: &MethodSymbol, owner: &ClassSymbol) -> String;

    /// Short method name form; ambiguous when the method is overloaded.
    fn method_compact_name(&self, method: &MethodSymbol, owner: &ClassSymbol) -> String;

    fn field_signature(&self, field: &FieldSymbol, owner: &ClassSymbol) -> String;

    /// Base identifier for an allocation of `type_name` inside the method
    /// named by `method_name` (either name form).
    fn allocation_id(&self, method_name: &str, type_name: &str) -> String;
}

/// The standard representation: `<pkg.Class: ret name(p1,p2)>` method
/// signatures, `pkg.Class.name` compact names, `<pkg.Class: type name>`
/// field signatures, and `<method>/new <Type>` allocation bases.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardRepr;

impl ReprBuilder for StandardRepr {
    fn method_signature(&self, method: &MethodSymbol, owner: &ClassSymbol) -> String {
        format!(
            "<{}: {} {}({})>",
            owner.qualified_name,
            method.return_type,
            method.name,
            method.param_types.join(",")
        )
    }

    fn method_compact_name(&self, method: &MethodSymbol, owner: &ClassSymbol) -> String {
        format!("{}.{}", owner.qualified_name, method.name)
    }

    fn field_signature(&self, field: &FieldSymbol, owner: &ClassSymbol) -> String {
        format!(
            "<{}: {} {}>",
            owner.qualified_name, field.field_type, field.name
        )
    }

    fn allocation_id(&self, method_name: &str, type_name: &str) -> String {
        format!("{}/new {}", method_name, type_name)
    }
}
