use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub u32);

/// What a member-select or identifier node resolved to, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRef {
    Field(FieldId),
    Method(MethodId),
    Type(ClassId),
}

#[derive(Debug, Clone)]
pub struct ClassSymbol {
    pub qualified_name: String,
    /// Methods declared directly on this class, in declaration order.
    /// Inherited members are not listed.
    pub methods: Vec<MethodId>,
    pub pos: u32,
}

#[derive(Debug, Clone)]
pub struct MethodSymbol {
    pub owner: ClassId,
    /// Name as declared: `bar`, or `<init>` for constructors.
    pub name: String,
    pub param_types: Vec<String>,
    pub return_type: String,
    pub pos: u32,
}

#[derive(Debug, Clone)]
pub struct FieldSymbol {
    pub owner: ClassId,
    pub name: String,
    pub field_type: String,
    /// Offset of the declaration; `None` for synthetic fields the compiler
    /// introduced, which have no real source position.
    pub decl_pos: Option<u32>,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SymbolError {
    #[error("no class symbol with id {0}")]
    UnknownClass(u32),
    #[error("no method symbol with id {0}")]
    UnknownMethod(u32),
    #[error("no field symbol with id {0}")]
    UnknownField(u32),
}

/// Resolved symbols for one compilation unit, indexed by the id newtypes the
/// tree nodes carry.
#[derive(Debug, Default)]
pub struct SymbolTable {
    classes: Vec<ClassSymbol>,
    methods: Vec<MethodSymbol>,
    fields: Vec<FieldSymbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, class: ClassSymbol) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(class);
        id
    }

    /// Registers a method and records it among its owner's declared members.
    pub fn add_method(&mut self, method: MethodSymbol) -> Result<MethodId, SymbolError> {
        let owner = method.owner;
        let id = MethodId(self.methods.len() as u32);
        self.classes
            .get_mut(owner.0 as usize)
            .ok_or(SymbolError::UnknownClass(owner.0))?
            .methods
            .push(id);
        self.methods.push(method);
        Ok(id)
    }

    pub fn add_field(&mut self, field: FieldSymbol) -> Result<FieldId, SymbolError> {
        if self.classes.get(field.owner.0 as usize).is_none() {
            return Err(SymbolError::UnknownClass(field.owner.0));
        }
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(field);
        Ok(id)
    }

    pub fn class(&self, id: ClassId) -> Result<&ClassSymbol, SymbolError> {
        self.classes
            .get(id.0 as usize)
            .ok_or(SymbolError::UnknownClass(id.0))
    }

    pub fn method(&self, id: MethodId) -> Result<&MethodSymbol, SymbolError> {
        self.methods
            .get(id.0 as usize)
            .ok_or(SymbolError::UnknownMethod(id.0))
    }

    pub fn field(&self, id: FieldId) -> Result<&FieldSymbol, SymbolError> {
        self.fields
            .get(id.0 as usize)
            .ok_or(SymbolError::UnknownField(id.0))
    }
}
