use ghoul_ast::{
    AsgContext, DeclId, DeclKind, FileId, Span, Type, TypeKind,
};
use tracing::{debug, warn};

use crate::error::SemaError;
use crate::namespace_prototyper::{find_namespace, NamespaceProto};
use crate::signatures::{CompareResult, SignatureComparer};

/// Resolves imports, assigns every declaration its `container`
/// back-reference, emits the `Self` placeholder on instance methods, and
/// rejects obvious redefinitions.
pub struct BasicDeclValidator<'a> {
    ctx: &'a mut AsgContext,
    protos: &'a [NamespaceProto],
}

impl<'a> BasicDeclValidator<'a> {
    pub fn new(ctx: &'a mut AsgContext, protos: &'a [NamespaceProto]) -> BasicDeclValidator<'a> {
        BasicDeclValidator { ctx, protos }
    }

    pub fn validate_file(&mut self, file: FileId) -> Result<(), SemaError> {
        debug!(file = file.index(), "validating declarations");

        let top_decls = self.ctx.file(file).decls.clone();

        for &decl_id in &top_decls {
            self.assign_containers(decl_id, None, false);
        }

        for &decl_id in &top_decls {
            self.resolve_imports(decl_id)
                .map_err(|err| err.with_file(file))?;
        }

        for &decl_id in &top_decls {
            self.emit_self_placeholders(decl_id);
        }

        self.check_scope(&top_decls)
            .map_err(|err| err.with_file(file))?;

        Ok(())
    }

    /// Redefinition detection for the merged namespace scopes. Run once
    /// after every file was validated.
    pub fn validate_merged_namespaces(&mut self) -> Result<(), SemaError> {
        let mut stack: Vec<&NamespaceProto> = self.protos.iter().collect();
        while let Some(proto) = stack.pop() {
            self.check_scope(&proto.members)?;
            stack.extend(proto.children.iter());
        }
        Ok(())
    }

    fn assign_containers(&mut self, decl_id: DeclId, container: Option<DeclId>, in_template: bool) {
        {
            let decl = self.ctx.decl_mut(decl_id);
            decl.container = container;
            decl.contained_in_template = in_template;
        }

        let decl = self.ctx.decl(decl_id);
        let child_in_template = in_template || decl.template_params().is_some();

        let mut children = decl.member_ids();
        if let Some(params) = decl.template_params() {
            children.extend_from_slice(params);
        }
        if let Some(func) = decl.function() {
            children.extend_from_slice(&func.params);
        }
        if let DeclKind::Subscript(subscript) = &decl.kind {
            children.extend_from_slice(&subscript.params);
        }

        for child in children {
            self.assign_containers(child, Some(decl_id), child_in_template);
        }
    }

    fn resolve_imports(&mut self, decl_id: DeclId) -> Result<(), SemaError> {
        let decl = self.ctx.decl(decl_id);

        if let DeclKind::Import(import) = &decl.kind {
            let span = decl.span;
            let path: Vec<String> = import.path.iter().map(|seg| seg.node.clone()).collect();

            if find_namespace(self.protos, &path).is_none() {
                return Err(SemaError::new(
                    format!("unresolved import `{}`", path.join(".")),
                    span,
                ));
            }

            if let DeclKind::Import(import) = &mut self.ctx.decl_mut(decl_id).kind {
                import.resolved = Some(path);
            }
            return Ok(());
        }

        for member in decl.member_ids() {
            self.resolve_imports(member)?;
        }
        Ok(())
    }

    /// Instance methods of structs, classes, unions, traits and extensions
    /// get a `Self` placeholder; it is replaced by the concrete owner type
    /// during instantiation.
    fn emit_self_placeholders(&mut self, decl_id: DeclId) {
        let decl = self.ctx.decl(decl_id);

        let is_type_container = matches!(
            decl.kind,
            DeclKind::Struct(_)
                | DeclKind::TemplateStruct(_)
                | DeclKind::Trait(_)
                | DeclKind::TemplateTrait(_)
                | DeclKind::Extension(_)
        );

        let members = decl.member_ids();

        if is_type_container {
            let span = decl.span;
            for &member in &members {
                let member_decl = self.ctx.decl_mut(member);
                if member_decl.is_static() {
                    continue;
                }
                if let Some(func) = member_decl.function_mut() {
                    if func.self_type.is_none() {
                        func.self_type = Some(Type::new(span, TypeKind::SelfType));
                    }
                }
                // Accessors of member properties and subscripts are also
                // instance code.
                for accessor in self.ctx.decl(member).member_ids() {
                    let accessor_decl = self.ctx.decl_mut(accessor);
                    if let Some(func) = accessor_decl.function_mut() {
                        if func.self_type.is_none() {
                            func.self_type = Some(Type::new(span, TypeKind::SelfType));
                        }
                    }
                }
            }
        }

        for member in members {
            self.emit_self_placeholders(member);
        }
    }

    /// Same-scope redefinition detection.
    fn check_scope(&self, members: &[DeclId]) -> Result<(), SemaError> {
        let comparer = SignatureComparer::new(self.ctx);

        for (index, &left) in members.iter().enumerate() {
            for &right in &members[index + 1..] {
                let left_decl = self.ctx.decl(left);
                let right_decl = self.ctx.decl(right);

                if left_decl.name.node != right_decl.name.node {
                    continue;
                }

                match (&left_decl.kind, &right_decl.kind) {
                    (DeclKind::Function(_), DeclKind::Function(_)) => {
                        match comparer.compare_functions(left, right, true) {
                            CompareResult::Exact => {
                                return Err(self.redefinition_error(
                                    &right_decl.name.node,
                                    right_decl.span,
                                ));
                            }
                            CompareResult::Similar => {
                                warn!(
                                    name = %right_decl.name.node,
                                    "declarations differ only in default-value coverage"
                                );
                            }
                            CompareResult::Different => {}
                        }
                    }
                    (DeclKind::TemplateFunction(_), DeclKind::TemplateFunction(_)) => {
                        match comparer.compare_template_functions(left, right, true) {
                            CompareResult::Exact => {
                                return Err(self.redefinition_error(
                                    &right_decl.name.node,
                                    right_decl.span,
                                ));
                            }
                            CompareResult::Similar => {
                                warn!(
                                    name = %right_decl.name.node,
                                    "template declarations differ only in default-value coverage"
                                );
                            }
                            CompareResult::Different => {}
                        }
                    }
                    // Overlapping template structs/traits are
                    // specializations, told apart by their contracts.
                    (DeclKind::TemplateStruct(_), DeclKind::TemplateStruct(_))
                    | (DeclKind::TemplateTrait(_), DeclKind::TemplateTrait(_)) => {}
                    (DeclKind::Struct(_), DeclKind::Struct(_))
                    | (DeclKind::Trait(_), DeclKind::Trait(_))
                    | (DeclKind::Enum(_), DeclKind::Enum(_))
                    | (DeclKind::TypeAlias(_), DeclKind::TypeAlias(_))
                    | (DeclKind::Variable(_), DeclKind::Variable(_))
                    | (DeclKind::Property(_), DeclKind::Property(_))
                    | (DeclKind::EnumConst(_), DeclKind::EnumConst(_)) => {
                        return Err(
                            self.redefinition_error(&right_decl.name.node, right_decl.span)
                        );
                    }
                    _ => {}
                }
            }
        }

        // Recurse into type containers: their member scopes are checked the
        // same way.
        for &member in members {
            let decl = self.ctx.decl(member);
            if matches!(
                decl.kind,
                DeclKind::Struct(_)
                    | DeclKind::TemplateStruct(_)
                    | DeclKind::Trait(_)
                    | DeclKind::TemplateTrait(_)
                    | DeclKind::Enum(_)
                    | DeclKind::Extension(_)
            ) {
                let children = decl.member_ids();
                self.check_scope(&children)?;
            }
        }

        Ok(())
    }

    fn redefinition_error(&self, name: &str, span: Span) -> SemaError {
        SemaError::new(format!("redefinition of `{name}`"), span)
    }
}
