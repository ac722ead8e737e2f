//! Whole-unit scanner for heap-allocation sites, field accesses, and method
//! declarations.
//!
//! [`SiteScanner`] walks a compilation unit's typed syntax tree depth-first
//! in source order, visiting every node exactly once, and populates the
//! three [`protocol::ScanIR`] maps: method declarations keyed by
//! disambiguating signature, allocations keyed by `<base>/<seq>` identifier,
//! and field-access span sets keyed by field signature. The identifiers are
//! deterministic across runs so downstream points-to facts can be mapped
//! back to source positions.

use anyhow::{Context, Result};
use protocol::{AllocationIR, MethodIR, ScanIR, Span};
use rustc_hash::FxHashMap;
use syntax::{render, ClassId, MemberRef, MethodId, Node, NodeKind, SymbolTable};
use tracing::{debug, info};

mod line_map;
mod repr;

pub use line_map::{LineIndex, LineMap};
pub use repr::{ReprBuilder, StandardRepr};

#[cfg(test)]
mod edge_cases;

/// How to name an allocation that occurs outside any method body (field
/// initializers, static and instance initializer blocks).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitializerPolicy {
    /// Clear the cached method context once its declaration has been fully
    /// scanned, and name initializer allocations with a synthetic
    /// `<clinit>` context of the enclosing class.
    #[default]
    SyntheticInitializer,
    /// Never clear the cached context, so an initializer allocation reuses
    /// whichever method was visited last. This matches the historical
    /// scanner; before the first method the synthetic convention applies.
    ReuseLastMethod,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub initializer_policy: InitializerPolicy,
}

#[derive(Debug, Clone)]
struct MethodContext {
    owner: ClassId,
    /// Declared name, the overload-table key.
    name: String,
    signature: String,
    compact_name: String,
}

/// One scanner instance scans one unit at a time, single-threaded; reusing
/// it across units accumulates into the same maps and keeps the global
/// allocation counters running.
pub struct SiteScanner<'a> {
    symbols: &'a SymbolTable,
    line_map: &'a dyn LineMap,
    repr: &'a dyn ReprBuilder,
    options: ScanOptions,
    current_class: Option<ClassId>,
    current_method: Option<MethodContext>,
    method_names_per_class: FxHashMap<ClassId, FxHashMap<String, u32>>,
    allocation_counters: FxHashMap<String, u32>,
    ir: ScanIR,
}

impl<'a> SiteScanner<'a> {
    pub fn new(symbols: &'a SymbolTable, line_map: &'a dyn LineMap, repr: &'a dyn ReprBuilder) -> Self {
        Self::with_options(symbols, line_map, repr, ScanOptions::default())
    }

    pub fn with_options(
        symbols: &'a SymbolTable,
        line_map: &'a dyn LineMap,
        repr: &'a dyn ReprBuilder,
        options: ScanOptions,
    ) -> Self {
        Self {
            symbols,
            line_map,
            repr,
            options,
            current_class: None,
            current_method: None,
            method_names_per_class: FxHashMap::default(),
            allocation_counters: FxHashMap::default(),
            ir: ScanIR::new(),
        }
    }

    /// Scans one compilation unit from its root node.
    pub fn scan_unit(&mut self, root: &Node) -> Result<()> {
        self.scan(root)?;
        info!(
            "scanned unit: {} methods, {} allocations, {} field signatures",
            self.ir.methods.len(),
            self.ir.allocations.len(),
            self.ir.field_accesses.len()
        );
        Ok(())
    }

    pub fn ir(&self) -> &ScanIR {
        &self.ir
    }

    pub fn into_ir(self) -> ScanIR {
        self.ir
    }

    fn scan_opt(&mut self, node: Option<&Node>) -> Result<()> {
        if let Some(node) = node {
            self.scan(node)?;
        }
        Ok(())
    }

    fn scan_all(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            self.scan(node)?;
        }
        Ok(())
    }

    /// One recursion rule per node kind, children in declared source order.
    /// The match is exhaustive over [`NodeKind`], so an unhandled kind is a
    /// compile error rather than a silently truncated subtree.
    fn scan(&mut self, node: &Node) -> Result<()> {
        match &node.kind {
            NodeKind::CompilationUnit {
                package_annotations,
                package_name,
                decls,
            } => {
                self.scan_all(package_annotations)?;
                self.scan_opt(package_name.as_deref())?;
                self.scan_all(decls)
            }
            NodeKind::Import { qualid } => self.scan(qualid),
            NodeKind::ClassDecl {
                sym,
                mods,
                type_params,
                extends,
                implements,
                members,
            } => self.scan_class_decl(
                *sym,
                mods,
                type_params,
                extends.as_deref(),
                implements,
                members,
            ),
            NodeKind::MethodDecl {
                sym,
                name,
                mods,
                return_type,
                type_params,
                receiver,
                params,
                thrown,
                default_value,
                body,
            } => self.scan_method_decl(
                node.pos,
                *sym,
                name,
                mods,
                return_type.as_deref(),
                type_params,
                receiver.as_deref(),
                params,
                thrown,
                default_value.as_deref(),
                body.as_deref(),
            ),
            NodeKind::VarDecl {
                mods,
                var_type,
                name_expr,
                init,
            } => {
                self.scan(mods)?;
                self.scan_opt(var_type.as_deref())?;
                self.scan_opt(name_expr.as_deref())?;
                self.scan_opt(init.as_deref())
            }
            NodeKind::Empty => Ok(()),
            NodeKind::Block { stats } => self.scan_all(stats),
            NodeKind::DoWhile { body, cond } => {
                self.scan(body)?;
                self.scan(cond)
            }
            NodeKind::While { cond, body } => {
                self.scan(cond)?;
                self.scan(body)
            }
            NodeKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.scan_all(init)?;
                self.scan_opt(cond.as_deref())?;
                self.scan_all(step)?;
                self.scan(body)
            }
            NodeKind::ForEach { var, expr, body } => {
                self.scan(var)?;
                self.scan(expr)?;
                self.scan(body)
            }
            NodeKind::Labeled { body } => self.scan(body),
            NodeKind::Switch { selector, cases } => {
                self.scan(selector)?;
                self.scan_all(cases)
            }
            NodeKind::Case { pat, stats } => {
                self.scan_opt(pat.as_deref())?;
                self.scan_all(stats)
            }
            NodeKind::Synchronized { lock, body } => {
                self.scan(lock)?;
                self.scan(body)
            }
            NodeKind::Try {
                resources,
                body,
                catches,
                finalizer,
            } => {
                self.scan_all(resources)?;
                self.scan(body)?;
                self.scan_all(catches)?;
                self.scan_opt(finalizer.as_deref())
            }
            NodeKind::Catch { param, body } => {
                self.scan(param)?;
                self.scan(body)
            }
            NodeKind::Conditional {
                cond,
                then_part,
                else_part,
            } => {
                self.scan(cond)?;
                self.scan(then_part)?;
                self.scan(else_part)
            }
            NodeKind::If {
                cond,
                then_part,
                else_part,
            } => {
                self.scan(cond)?;
                self.scan(then_part)?;
                self.scan_opt(else_part.as_deref())
            }
            NodeKind::ExprStmt { expr } => self.scan(expr),
            NodeKind::Break => Ok(()),
            NodeKind::Continue => Ok(()),
            NodeKind::Return { expr } => self.scan_opt(expr.as_deref()),
            NodeKind::Throw { expr } => self.scan(expr),
            NodeKind::Assert { cond, detail } => {
                self.scan(cond)?;
                self.scan_opt(detail.as_deref())
            }
            NodeKind::MethodInvocation {
                type_args,
                method,
                args,
            } => {
                self.scan_all(type_args)?;
                self.scan(method)?;
                self.scan_all(args)
            }
            NodeKind::NewClass {
                enclosing,
                type_args,
                class,
                resolved_type,
                args,
                body,
            } => self.scan_new_class(
                enclosing.as_deref(),
                type_args,
                class,
                resolved_type,
                args,
                body.as_deref(),
            ),
            NodeKind::NewArray {
                annotations,
                elem_type,
                dims,
                dim_annotations,
                elems,
            } => {
                self.scan_all(annotations)?;
                self.scan_opt(elem_type.as_deref())?;
                self.scan_all(dims)?;
                for dim in dim_annotations {
                    self.scan_all(dim)?;
                }
                self.scan_all(elems)
            }
            // Body before parameters, the grammar's declared order here.
            NodeKind::Lambda { body, params } => {
                self.scan(body)?;
                self.scan_all(params)
            }
            NodeKind::Parens { expr } => self.scan(expr),
            NodeKind::Assign { lhs, rhs } => {
                self.scan(lhs)?;
                self.scan(rhs)
            }
            NodeKind::AssignOp { lhs, rhs } => {
                self.scan(lhs)?;
                self.scan(rhs)
            }
            NodeKind::Unary { arg } => self.scan(arg),
            NodeKind::Binary { lhs, rhs } => {
                self.scan(lhs)?;
                self.scan(rhs)
            }
            NodeKind::TypeCast { clazz, expr } => {
                self.scan(clazz)?;
                self.scan(expr)
            }
            NodeKind::InstanceOf { expr, clazz } => {
                self.scan(expr)?;
                self.scan(clazz)
            }
            NodeKind::ArrayAccess { indexed, index } => {
                self.scan(indexed)?;
                self.scan(index)
            }
            NodeKind::FieldSelect {
                selected,
                name: _,
                sym,
            } => self.scan_select(node.pos, selected, *sym),
            NodeKind::MemberReference { expr, type_args } => {
                self.scan(expr)?;
                self.scan_all(type_args)
            }
            NodeKind::Ident { .. } => Ok(()),
            NodeKind::Literal { .. } => Ok(()),
            NodeKind::PrimitiveType { .. } => Ok(()),
            NodeKind::ArrayType { elem_type } => self.scan(elem_type),
            NodeKind::TypeApply { class, args } => {
                self.scan(class)?;
                self.scan_all(args)
            }
            NodeKind::TypeUnion { alternatives } => self.scan_all(alternatives),
            NodeKind::TypeIntersection { bounds } => self.scan_all(bounds),
            NodeKind::TypeParameter {
                annotations,
                bounds,
            } => {
                self.scan_all(annotations)?;
                self.scan_all(bounds)
            }
            NodeKind::Wildcard { kind: _, inner } => self.scan_opt(inner.as_deref()),
            NodeKind::Modifiers { annotations } => self.scan_all(annotations),
            NodeKind::Annotation {
                annotation_type,
                args,
            } => {
                self.scan(annotation_type)?;
                self.scan_all(args)
            }
            NodeKind::AnnotatedType {
                annotations,
                underlying,
            } => {
                self.scan_all(annotations)?;
                self.scan(underlying)
            }
            NodeKind::Erroneous => Ok(()),
            NodeKind::LetExpr { defs, expr } => {
                self.scan_all(defs)?;
                self.scan(expr)
            }
        }
    }

    /// Builds the class's overload table on first entry, then descends into
    /// its members. The table counts declared method names so allocation
    /// naming can tell overloaded methods apart; it is never rebuilt.
    fn scan_class_decl(
        &mut self,
        sym: ClassId,
        mods: &Node,
        type_params: &[Node],
        extends: Option<&Node>,
        implements: &[Node],
        members: &[Node],
    ) -> Result<()> {
        let saved_class = self.current_class.replace(sym);

        if !self.method_names_per_class.contains_key(&sym) {
            let class = self
                .symbols
                .class(sym)
                .context("class declaration with dangling symbol id")?;
            let mut names: FxHashMap<String, u32> = FxHashMap::default();
            for &method_id in &class.methods {
                let method = self
                    .symbols
                    .method(method_id)
                    .context("class member list with dangling method id")?;
                *names.entry(method.name.clone()).or_insert(0) += 1;
            }
            self.method_names_per_class.insert(sym, names);
        }

        self.scan(mods)?;
        self.scan_all(type_params)?;
        self.scan_opt(extends)?;
        self.scan_all(implements)?;
        self.scan_all(members)?;

        self.current_class = saved_class;
        Ok(())
    }

    /// Caches the method's two name forms as current context, then records
    /// the declaration with a span covering only the name token.
    fn scan_method_decl(
        &mut self,
        pos: u32,
        sym: MethodId,
        name: &str,
        mods: &Node,
        return_type: Option<&Node>,
        type_params: &[Node],
        receiver: Option<&Node>,
        params: &[Node],
        thrown: &[Node],
        default_value: Option<&Node>,
        body: Option<&Node>,
    ) -> Result<()> {
        let method = self
            .symbols
            .method(sym)
            .context("method declaration with dangling symbol id")?;
        let owner = self
            .symbols
            .class(method.owner)
            .context("method symbol with dangling owner id")?;
        let signature = self.repr.method_signature(method, owner);
        let compact_name = self.repr.method_compact_name(method, owner);
        let saved_method = self.current_method.replace(MethodContext {
            owner: method.owner,
            name: method.name.clone(),
            signature: signature.clone(),
            compact_name,
        });

        self.scan(mods)?;
        self.scan_opt(return_type)?;

        let span = Span::new(
            self.line_map.line_number(pos),
            self.line_map.column_number(pos),
            self.line_map.column_number(pos + name.len() as u32),
        );
        debug!("method declaration {}", signature);
        self.ir
            .methods
            .insert(signature.clone(), MethodIR { signature, span });

        self.scan_all(type_params)?;
        self.scan_opt(receiver)?;
        self.scan_all(params)?;
        self.scan_all(thrown)?;
        self.scan_opt(default_value)?;
        self.scan_opt(body)?;

        match self.options.initializer_policy {
            InitializerPolicy::SyntheticInitializer => self.current_method = saved_method,
            InitializerPolicy::ReuseLastMethod => {}
        }
        Ok(())
    }

    /// Children first, then the allocation record: the overload table picks
    /// the method name form, a global counter keyed by base identifier
    /// assigns the `/<seq>` suffix, and the span covers the instantiated
    /// type reference.
    fn scan_new_class(
        &mut self,
        enclosing: Option<&Node>,
        type_args: &[Node],
        class: &Node,
        resolved_type: &str,
        args: &[Node],
        body: Option<&Node>,
    ) -> Result<()> {
        self.scan_opt(enclosing)?;
        self.scan_all(type_args)?;
        self.scan(class)?;
        self.scan_all(args)?;
        self.scan_opt(body)?;

        let method_name = self.allocating_method_name();
        let base = self.repr.allocation_id(&method_name, resolved_type);
        let counter = self
            .allocation_counters
            .entry(base.clone())
            .and_modify(|c| *c += 1)
            .or_insert(0);
        let id = format!("{}/{}", base, counter);

        let rendered = render(class);
        let span = Span::new(
            self.line_map.line_number(class.pos),
            self.line_map.column_number(class.pos),
            self.line_map.column_number(class.pos + rendered.len() as u32),
        );
        debug!("found heap allocation {}", id);
        self.ir.allocations.insert(id.clone(), AllocationIR { id, span });
        Ok(())
    }

    /// The name form fed into the allocation base identifier: the cached
    /// method's signature when its name is overloaded in its owning class,
    /// its compact name otherwise, or a synthetic `<clinit>` context when no
    /// method is in scope.
    fn allocating_method_name(&self) -> String {
        match &self.current_method {
            Some(ctx) => {
                let declared = self
                    .method_names_per_class
                    .get(&ctx.owner)
                    .and_then(|names| names.get(&ctx.name))
                    .copied()
                    .unwrap_or(0);
                if declared > 1 {
                    ctx.signature.clone()
                } else {
                    ctx.compact_name.clone()
                }
            }
            None => {
                let owner = self
                    .current_class
                    .and_then(|id| self.symbols.class(id).ok())
                    .map(|class| class.qualified_name.as_str())
                    .unwrap_or("<toplevel>");
                format!("{}.<clinit>", owner)
            }
        }
    }

    /// Records a field access when the selected member resolves to a field
    /// whose declaration has a real source line. A first occurrence with an
    /// invalid declaration position still claims an empty entry for the
    /// signature.
    fn scan_select(&mut self, pos: u32, selected: &Node, sym: Option<MemberRef>) -> Result<()> {
        self.scan(selected)?;

        let Some(MemberRef::Field(field_id)) = sym else {
            return Ok(());
        };
        let field = self
            .symbols
            .field(field_id)
            .context("field access with dangling symbol id")?;
        let owner = self
            .symbols
            .class(field.owner)
            .context("field symbol with dangling owner id")?;
        let signature = self.repr.field_signature(field, owner);
        debug!("field signature {}", signature);

        let declared_line = field
            .decl_pos
            .map(|p| self.line_map.line_number(p))
            .unwrap_or(0);
        let span = Span::new(
            self.line_map.line_number(pos),
            self.line_map.column_number(pos),
            self.line_map.column_number(pos + field.name.len() as u32),
        );

        let positions = self.ir.field_accesses.entry(signature).or_default();
        if declared_line > 0 {
            positions.insert(span);
        }
        Ok(())
    }
}
