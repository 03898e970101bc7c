use ghoul_ast::{AsgContext, DeclId, DeclKind};

/// Cross-file merged view of a namespace. Members reference the original
/// declarations without owning them.
#[derive(Clone, Debug, Default)]
pub struct NamespaceProto {
    pub name: String,
    pub members: Vec<DeclId>,
    pub children: Vec<NamespaceProto>,
}

impl NamespaceProto {
    pub fn child(&self, name: &str) -> Option<&NamespaceProto> {
        self.children.iter().find(|child| child.name == name)
    }

    fn child_mut(&mut self, name: &str) -> &mut NamespaceProto {
        if let Some(index) = self.children.iter().position(|child| child.name == name) {
            return &mut self.children[index];
        }
        self.children.push(NamespaceProto {
            name: name.to_string(),
            ..NamespaceProto::default()
        });
        self.children.last_mut().expect("just pushed")
    }
}

/// Finds a namespace by dotted path among the root prototypes.
pub fn find_namespace<'a>(roots: &'a [NamespaceProto], path: &[String]) -> Option<&'a NamespaceProto> {
    let (first, rest) = path.split_first()?;
    let mut current = roots.iter().find(|proto| &proto.name == first)?;
    for segment in rest {
        current = current.child(segment)?;
    }
    Some(current)
}

/// Merges every file's top-level namespaces into one prototype tree,
/// de-duplicating by path. File order and document order are preserved so
/// later passes observe members deterministically.
pub struct NamespacePrototyper;

impl NamespacePrototyper {
    pub fn generate_prototypes(ctx: &AsgContext) -> Vec<NamespaceProto> {
        let mut roots: Vec<NamespaceProto> = Vec::new();

        for file in ctx.files() {
            for &decl_id in &file.decls {
                let decl = ctx.decl(decl_id);
                if let DeclKind::Namespace(_) = &decl.kind {
                    let root = root_proto(&mut roots, &decl.name.node);
                    merge_namespace(ctx, root, decl_id);
                }
            }
        }

        roots
    }
}

fn root_proto<'a>(roots: &'a mut Vec<NamespaceProto>, name: &str) -> &'a mut NamespaceProto {
    if let Some(index) = roots.iter().position(|proto| proto.name == name) {
        return &mut roots[index];
    }
    roots.push(NamespaceProto {
        name: name.to_string(),
        ..NamespaceProto::default()
    });
    roots.last_mut().expect("just pushed")
}

fn merge_namespace(ctx: &AsgContext, proto: &mut NamespaceProto, namespace: DeclId) {
    let DeclKind::Namespace(ns) = &ctx.decl(namespace).kind else {
        return;
    };

    for &member in &ns.members {
        let member_decl = ctx.decl(member);
        match &member_decl.kind {
            DeclKind::Namespace(_) => {
                let child = proto.child_mut(&member_decl.name.node);
                merge_namespace(ctx, child, member);
            }
            _ => proto.members.push(member),
        }
    }
}
