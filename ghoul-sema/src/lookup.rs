//! Scope-walking name lookup: the containing declaration chain first, then
//! the file's top level, then imported namespaces.

use ghoul_ast::{AsgContext, DeclId, DeclKind, Expr, ExprKind, FileId, Ident, Type, TypeKind};

use crate::namespace_prototyper::{find_namespace, NamespaceProto};

pub(crate) struct NameLookup<'a> {
    pub ctx: &'a AsgContext,
    pub protos: &'a [NamespaceProto],
}

impl<'a> NameLookup<'a> {
    pub fn new(ctx: &'a AsgContext, protos: &'a [NamespaceProto]) -> NameLookup<'a> {
        NameLookup { ctx, protos }
    }

    /// Every declaration named `name` visible from `scope`, ordered from the
    /// innermost scope outward. Candidate collection keeps all matches so
    /// callers can resolve overloads or specializations themselves.
    pub fn lookup(&self, file: FileId, scope: Option<DeclId>, name: &str) -> Vec<DeclId> {
        let mut result = Vec::new();

        // Containing declarations, the starting decl included (its template
        // parameters and members are in scope for its own types).
        let mut current = scope;
        while let Some(decl_id) = current {
            let decl = self.ctx.decl(decl_id);

            if let Some(params) = decl.template_params() {
                for &param in params {
                    if self.ctx.decl(param).name.node == name {
                        result.push(param);
                    }
                }
            }

            for member in decl.member_ids() {
                if self.ctx.decl(member).name.node == name {
                    result.push(member);
                }
            }

            // A merged namespace also sees the members contributed by other
            // files.
            if matches!(decl.kind, DeclKind::Namespace(_)) {
                if let Some(proto) = self.proto_for_namespace(decl_id) {
                    for &member in &proto.members {
                        if self.ctx.decl(member).name.node == name && !result.contains(&member) {
                            result.push(member);
                        }
                    }
                }
            }

            current = decl.container;
        }

        // File top level.
        for &decl_id in &self.ctx.file(file).decls {
            let decl = self.ctx.decl(decl_id);
            if decl.name.node == name && !result.contains(&decl_id) {
                result.push(decl_id);
            }
        }

        // Imported namespaces bring their members into file scope.
        for proto in self.imports_of(file) {
            for &member in &proto.members {
                if self.ctx.decl(member).name.node == name && !result.contains(&member) {
                    result.push(member);
                }
            }
        }

        result
    }

    /// The prototypes a file's imports resolve to.
    pub fn imports_of(&self, file: FileId) -> Vec<&'a NamespaceProto> {
        let mut result = Vec::new();
        for &decl_id in &self.ctx.file(file).decls {
            if let DeclKind::Import(import) = &self.ctx.decl(decl_id).kind {
                if let Some(path) = &import.resolved {
                    if let Some(proto) = find_namespace(self.protos, path) {
                        result.push(proto);
                    }
                }
            }
        }
        result
    }

    /// Resolves a dotted namespace path; the first segment may be an import
    /// alias.
    pub fn resolve_namespace(&self, file: FileId, path: &[String]) -> Option<&'a NamespaceProto> {
        if let Some(proto) = find_namespace(self.protos, path) {
            return Some(proto);
        }

        // Alias form: `import a.b as c` makes `c.X` name `a.b.X`.
        let (first, rest) = path.split_first()?;
        for &decl_id in &self.ctx.file(file).decls {
            if let DeclKind::Import(import) = &self.ctx.decl(decl_id).kind {
                let alias_matches = import
                    .alias
                    .as_ref()
                    .is_some_and(|alias| &alias.node == first);
                if alias_matches {
                    if let Some(resolved) = &import.resolved {
                        let mut full = resolved.clone();
                        full.extend(rest.iter().cloned());
                        return find_namespace(self.protos, &full);
                    }
                }
            }
        }

        None
    }
}

/// True for declarations that introduce a type name.
pub(crate) fn is_type_decl(kind: &DeclKind) -> bool {
    matches!(
        kind,
        DeclKind::Struct(_)
            | DeclKind::TemplateStruct(_)
            | DeclKind::Trait(_)
            | DeclKind::TemplateTrait(_)
            | DeclKind::Enum(_)
            | DeclKind::TypeAlias(_)
            | DeclKind::TemplateParameter(_)
    )
}

/// Reconstructs a dotted name from an identifier / member-access chain, as
/// produced for template arguments that turn out to name types.
pub(crate) fn expr_as_dotted_name(expr: &Expr) -> Option<(Vec<Ident>, Ident, Vec<Expr>)> {
    match &expr.kind {
        ExprKind::Identifier {
            name,
            template_args,
        } => Some((Vec::new(), name.clone(), template_args.clone())),
        ExprKind::MemberAccess {
            is_arrow: false,
            object,
            member,
            template_args,
        } => {
            let (mut path, prev_name, prev_args) = expr_as_dotted_name(object)?;
            if !prev_args.is_empty() {
                return None;
            }
            path.push(prev_name);
            Some((path, member.clone(), template_args.clone()))
        }
        _ => None,
    }
}

/// Turns a dotted-name expression into an unresolved type reference.
pub(crate) fn expr_to_unresolved_type(expr: &Expr) -> Option<Type> {
    let (path, name, args) = expr_as_dotted_name(expr)?;
    Some(Type::new(
        expr.span,
        TypeKind::Unresolved { path, name, args },
    ))
}

impl<'a> NameLookup<'a> {
    /// Finds the prototype matching a namespace declaration by walking its
    /// container chain up to a root.
    fn proto_for_namespace(&self, namespace: DeclId) -> Option<&'a NamespaceProto> {
        let mut path = vec![self.ctx.decl(namespace).name.node.clone()];
        let mut current = self.ctx.decl(namespace).container;
        while let Some(container) = current {
            let decl = self.ctx.decl(container);
            if !matches!(decl.kind, DeclKind::Namespace(_)) {
                return None;
            }
            path.push(decl.name.node.clone());
            current = decl.container;
        }
        path.reverse();
        find_namespace(self.protos, &path)
    }
}
