use crate::decl::Decl;

/// Handle to a declaration in the [`AsgContext`] arena.
///
/// Ownership of declarations is tree-shaped along the member-list axis;
/// back-references (a decl's container, an instantiation's template) are
/// plain ids so the graph stays cycle-free on the owning axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);

impl DeclId {
    /// Placeholder id carried by a decl that has not been allocated yet.
    pub const PLACEHOLDER: DeclId = DeclId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct SourceFile {
    pub id: FileId,
    pub path: String,
    pub text: String,
    /// Top-level declarations, in document order.
    pub decls: Vec<DeclId>,
}

/// The arena holding every declaration of a compilation, plus the source
/// files they came from. Statements, expressions, types and contracts are
/// owned inline by their declaration; only declarations get arena ids
/// because only declarations are targets of back-references.
#[derive(Debug, Default)]
pub struct AsgContext {
    decls: Vec<Decl>,
    files: Vec<SourceFile>,
}

impl AsgContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: String, text: String) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            id,
            path,
            text,
            decls: Vec::new(),
        });
        id
    }

    pub fn alloc(&mut self, mut decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        decl.id = id;
        self.decls.push(decl);
        id
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.index()]
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Ids of every decl currently in the arena. The range is snapshotted
    /// at call time, so allocating during iteration is safe (new decls are
    /// simply not visited).
    pub fn decl_ids(&self) -> impl Iterator<Item = DeclId> {
        (0..self.decls.len() as u32).map(DeclId)
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    pub fn file_mut(&mut self, id: FileId) -> &mut SourceFile {
        &mut self.files[id.index()]
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Walks the container chain from `id` outward to the root.
    pub fn containers(&self, id: DeclId) -> Vec<DeclId> {
        let mut result = Vec::new();
        let mut current = self.decl(id).container;
        while let Some(container) = current {
            result.push(container);
            current = self.decl(container).container;
        }
        result
    }
}
