use crate::arena::{DeclId, FileId};
use crate::attr::Attr;
use crate::cont::Cont;
use crate::expr::{Expr, InfixOperator, PostfixOperator, PrefixOperator};
use crate::stmt::CompoundStmt;
use crate::ty::Type;
use crate::{Ident, Span};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Unassigned,
    Public,
    Private,
    Protected,
    Internal,
    ProtectedInternal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclModifier {
    Static,
    Mut,
    Volatile,
    Abstract,
    Virtual,
    Override,
    Extern,
    Prototype,
}

impl DeclModifier {
    pub fn keyword(self) -> &'static str {
        match self {
            DeclModifier::Static => "static",
            DeclModifier::Mut => "mut",
            DeclModifier::Volatile => "volatile",
            DeclModifier::Abstract => "abstract",
            DeclModifier::Virtual => "virtual",
            DeclModifier::Override => "override",
            DeclModifier::Extern => "extern",
            DeclModifier::Prototype => "prototype",
        }
    }
}

/// Checked modifier set; duplicates are rejected at insertion so the parser
/// can report the offending keyword.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeclModifiers(u16);

impl DeclModifiers {
    pub const NONE: DeclModifiers = DeclModifiers(0);

    fn bit(modifier: DeclModifier) -> u16 {
        1 << modifier as u16
    }

    pub fn contains(self, modifier: DeclModifier) -> bool {
        self.0 & Self::bit(modifier) != 0
    }

    /// Returns `false` if the modifier was already present.
    pub fn insert(&mut self, modifier: DeclModifier) -> bool {
        if self.contains(modifier) {
            return false;
        }
        self.0 |= Self::bit(modifier);
        true
    }

    pub fn with(mut self, modifier: DeclModifier) -> DeclModifiers {
        self.0 |= Self::bit(modifier);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when the set contains nothing outside `allowed`.
    pub fn only_contains(self, allowed: &[DeclModifier]) -> bool {
        let mut mask = 0u16;
        for modifier in allowed {
            mask |= Self::bit(*modifier);
        }
        self.0 & !mask == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decl {
    pub id: DeclId,
    pub file: FileId,
    pub span: Span,
    pub attrs: Vec<Attr>,
    pub visibility: Visibility,
    pub modifiers: DeclModifiers,
    /// `const` on the declaration ("constant expression", not a modifier bit).
    pub is_const_expr: bool,
    pub name: Ident,
    pub container: Option<DeclId>,
    pub contained_in_template: bool,
    pub mangled_name: Option<String>,
    pub kind: DeclKind,
}

impl Decl {
    pub fn new(file: FileId, span: Span, name: Ident, kind: DeclKind) -> Decl {
        Decl {
            id: DeclId::PLACEHOLDER,
            file,
            span,
            attrs: Vec::new(),
            visibility: Visibility::Unassigned,
            modifiers: DeclModifiers::NONE,
            is_const_expr: false,
            name,
            container: None,
            contained_in_template: false,
            mangled_name: None,
            kind,
        }
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains(DeclModifier::Static)
    }

    pub fn is_mutable(&self) -> bool {
        self.modifiers.contains(DeclModifier::Mut)
    }

    pub fn is_virtual(&self) -> bool {
        self.modifiers.contains(DeclModifier::Virtual)
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(DeclModifier::Abstract)
    }

    pub fn is_override(&self) -> bool {
        self.modifiers.contains(DeclModifier::Override)
    }

    pub fn is_extern(&self) -> bool {
        self.modifiers.contains(DeclModifier::Extern)
    }

    pub fn is_prototype(&self) -> bool {
        self.modifiers.contains(DeclModifier::Prototype)
    }

    pub fn is_any_virtual(&self) -> bool {
        self.is_virtual() || self.is_abstract() || self.is_override()
    }

    /// A mangled name is assigned exactly once.
    pub fn set_mangled_name(&mut self, mangled: String) {
        assert!(
            self.mangled_name.is_none(),
            "mangled name assigned twice for `{}`",
            self.name.node
        );
        self.mangled_name = Some(mangled);
    }

    /// Kind name for diagnostics.
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            DeclKind::Import(_) => "import",
            DeclKind::Namespace(_) => "namespace",
            DeclKind::Function(_) => "function",
            DeclKind::TemplateFunction(_) => "template function",
            DeclKind::Operator(_) => "operator",
            DeclKind::CastOperator(_) => "cast operator",
            DeclKind::CallOperator(_) => "call operator",
            DeclKind::Property(_) => "property",
            DeclKind::PropertyGet(_) => "property getter",
            DeclKind::PropertySet(_) => "property setter",
            DeclKind::Subscript(_) => "subscript",
            DeclKind::SubscriptGet(_) => "subscript getter",
            DeclKind::SubscriptSet(_) => "subscript setter",
            DeclKind::Constructor(_) => "init",
            DeclKind::Destructor(_) => "deinit",
            DeclKind::Struct(def) => match def.kind {
                StructKind::Struct => "struct",
                StructKind::Class => "class",
                StructKind::Union => "union",
            },
            DeclKind::TemplateStruct(_) => "template struct",
            DeclKind::Trait(_) => "trait",
            DeclKind::TemplateTrait(_) => "template trait",
            DeclKind::Extension(_) => "extension",
            DeclKind::TypeAlias(_) => "typealias",
            DeclKind::TypeSuffix(_) => "typesuffix",
            DeclKind::Enum(_) => "enum",
            DeclKind::EnumConst(_) => "enum case",
            DeclKind::Variable(_) => "variable",
            DeclKind::Parameter(_) => "parameter",
            DeclKind::TemplateParameter(_) => "template parameter",
            DeclKind::TraitPrototype(_) => "trait prototype",
        }
    }

    /// The function payload for function-like declarations.
    pub fn function(&self) -> Option<&FunctionDecl> {
        match &self.kind {
            DeclKind::Function(func)
            | DeclKind::CallOperator(func)
            | DeclKind::Destructor(func)
            | DeclKind::TypeSuffix(func) => Some(func),
            DeclKind::TemplateFunction(template) => Some(&template.func),
            DeclKind::Operator(op) => Some(&op.func),
            DeclKind::CastOperator(cast) => Some(&cast.func),
            DeclKind::Constructor(ctor) => Some(&ctor.func),
            DeclKind::PropertyGet(accessor)
            | DeclKind::PropertySet(accessor)
            | DeclKind::SubscriptGet(accessor)
            | DeclKind::SubscriptSet(accessor) => Some(&accessor.func),
            _ => None,
        }
    }

    pub fn function_mut(&mut self) -> Option<&mut FunctionDecl> {
        match &mut self.kind {
            DeclKind::Function(func)
            | DeclKind::CallOperator(func)
            | DeclKind::Destructor(func)
            | DeclKind::TypeSuffix(func) => Some(func),
            DeclKind::TemplateFunction(template) => Some(&mut template.func),
            DeclKind::Operator(op) => Some(&mut op.func),
            DeclKind::CastOperator(cast) => Some(&mut cast.func),
            DeclKind::Constructor(ctor) => Some(&mut ctor.func),
            DeclKind::PropertyGet(accessor)
            | DeclKind::PropertySet(accessor)
            | DeclKind::SubscriptGet(accessor)
            | DeclKind::SubscriptSet(accessor) => Some(&mut accessor.func),
            _ => None,
        }
    }

    /// Member decl ids of container-like declarations, in document order.
    pub fn member_ids(&self) -> Vec<DeclId> {
        match &self.kind {
            DeclKind::Namespace(ns) => ns.members.clone(),
            DeclKind::Struct(def) => {
                let mut members = def.members.clone();
                members.extend(def.constructors.iter().copied());
                members.extend(def.destructor.iter().copied());
                members
            }
            DeclKind::TemplateStruct(template) => {
                let mut members = template.def.members.clone();
                members.extend(template.def.constructors.iter().copied());
                members.extend(template.def.destructor.iter().copied());
                members
            }
            DeclKind::Trait(def) => def.members.clone(),
            DeclKind::TemplateTrait(template) => template.def.members.clone(),
            DeclKind::Extension(ext) => ext.members.clone(),
            DeclKind::Enum(def) => {
                let mut members = def.consts.clone();
                members.extend(def.members.iter().copied());
                members
            }
            DeclKind::Property(prop) => {
                let mut members = prop.getters.clone();
                members.extend(prop.setter.iter().copied());
                members
            }
            DeclKind::Subscript(sub) => {
                let mut members = sub.getters.clone();
                members.extend(sub.setter.iter().copied());
                members
            }
            _ => Vec::new(),
        }
    }

    pub fn template_params(&self) -> Option<&[DeclId]> {
        match &self.kind {
            DeclKind::TemplateFunction(template) => Some(&template.template_params),
            DeclKind::TemplateStruct(template) => Some(&template.template_params),
            DeclKind::TemplateTrait(template) => Some(&template.template_params),
            DeclKind::TypeAlias(alias) if !alias.template_params.is_empty() => {
                Some(&alias.template_params)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeclKind {
    Import(ImportDecl),
    Namespace(NamespaceDecl),
    Function(FunctionDecl),
    TemplateFunction(TemplateFunctionDecl),
    Operator(OperatorDecl),
    CastOperator(CastOperatorDecl),
    CallOperator(FunctionDecl),
    Property(PropertyDecl),
    PropertyGet(AccessorDecl),
    PropertySet(AccessorDecl),
    Subscript(SubscriptDecl),
    SubscriptGet(AccessorDecl),
    SubscriptSet(AccessorDecl),
    Constructor(ConstructorDecl),
    Destructor(FunctionDecl),
    Struct(StructDecl),
    TemplateStruct(TemplateStructDecl),
    Trait(TraitDecl),
    TemplateTrait(TemplateTraitDecl),
    Extension(ExtensionDecl),
    TypeAlias(TypeAliasDecl),
    TypeSuffix(FunctionDecl),
    Enum(EnumDecl),
    EnumConst(EnumConstDecl),
    Variable(VariableDecl),
    Parameter(ParameterDecl),
    TemplateParameter(TemplateParameterDecl),
    TraitPrototype(TraitPrototypeDecl),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportDecl {
    pub path: Vec<Ident>,
    pub alias: Option<Ident>,
    /// Namespace path the import resolved to (set by BasicDeclValidator).
    pub resolved: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamespaceDecl {
    pub members: Vec<DeclId>,
}

/// Identity of an instantiation: the template it came from and the
/// (resolved) argument list it was produced with.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateInstInfo {
    pub template: DeclId,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub params: Vec<DeclId>,
    pub return_type: Option<Type>,
    pub contracts: Vec<Cont>,
    pub body: CompoundStmt,
    /// Set by DeclInstantiator from the `throws` contract.
    pub throws: bool,
    /// `Self` placeholder emitted by BasicDeclValidator on instance
    /// methods; replaced with the concrete owner type at instantiation.
    pub self_type: Option<Type>,
    pub instantiated_from: Option<TemplateInstInfo>,
}

impl FunctionDecl {
    pub fn new(params: Vec<DeclId>, return_type: Option<Type>, contracts: Vec<Cont>, body: CompoundStmt) -> FunctionDecl {
        FunctionDecl {
            params,
            return_type,
            contracts,
            body,
            throws: false,
            self_type: None,
            instantiated_from: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateFunctionDecl {
    pub template_params: Vec<DeclId>,
    pub func: FunctionDecl,
    pub instantiations: Vec<DeclId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorKind {
    Prefix(PrefixOperator),
    Infix(InfixOperator),
    Postfix(PostfixOperator),
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperatorDecl {
    pub op: OperatorKind,
    pub func: FunctionDecl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastKind {
    Explicit,
    Implicit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CastOperatorDecl {
    pub cast_kind: CastKind,
    pub target_type: Type,
    pub func: FunctionDecl,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDecl {
    pub property_type: Type,
    pub getters: Vec<DeclId>,
    pub setter: Option<DeclId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetResult {
    Normal,
    Ref,
    RefMut,
}

/// Getter or setter of a property or subscript.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessorDecl {
    pub result: GetResult,
    pub func: FunctionDecl,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptDecl {
    pub params: Vec<DeclId>,
    pub element_type: Type,
    pub getters: Vec<DeclId>,
    pub setter: Option<DeclId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructorKind {
    Normal,
    Copy,
    Move,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstructorDecl {
    pub kind: ConstructorKind,
    /// `init() : base(…)` / `: self(…)` delegation.
    pub base_call: Option<Expr>,
    pub func: FunctionDecl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructKind {
    Struct,
    Class,
    Union,
}

/// Template-decl processing state; `Layouting` marks members of the active
/// layout path so cycles can be reported with the full chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InstState {
    #[default]
    Unprocessed,
    Layouting,
    Layouted,
    Mangled,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructLayout {
    pub size: u64,
    pub align: u64,
    pub field_offsets: Vec<(DeclId, u64)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDecl {
    pub kind: StructKind,
    pub inherited: Vec<Type>,
    pub contracts: Vec<Cont>,
    pub members: Vec<DeclId>,
    pub constructors: Vec<DeclId>,
    pub destructor: Option<DeclId>,
    pub instantiated_from: Option<TemplateInstInfo>,
    pub layout: Option<StructLayout>,
    /// Virtual function slots, in slot order.
    pub vtable: Vec<DeclId>,
    pub vtable_name: Option<String>,
    /// Full inherited-type set including indirect bases, filled during
    /// instantiation; consulted by contract satisfaction checks.
    pub all_inherited: Vec<Type>,
    pub state: InstState,
}

impl StructDecl {
    pub fn new(kind: StructKind, inherited: Vec<Type>, contracts: Vec<Cont>) -> StructDecl {
        StructDecl {
            kind,
            inherited,
            contracts,
            members: Vec::new(),
            constructors: Vec::new(),
            destructor: None,
            instantiated_from: None,
            layout: None,
            vtable: Vec::new(),
            vtable_name: None,
            all_inherited: Vec::new(),
            state: InstState::Unprocessed,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateStructDecl {
    pub template_params: Vec<DeclId>,
    pub def: StructDecl,
    pub instantiations: Vec<DeclId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraitDecl {
    pub inherited: Vec<Type>,
    pub contracts: Vec<Cont>,
    pub members: Vec<DeclId>,
    pub instantiated_from: Option<TemplateInstInfo>,
    pub all_inherited: Vec<Type>,
}

impl TraitDecl {
    pub fn new(inherited: Vec<Type>, contracts: Vec<Cont>) -> TraitDecl {
        TraitDecl {
            inherited,
            contracts,
            members: Vec::new(),
            instantiated_from: None,
            all_inherited: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateTraitDecl {
    pub template_params: Vec<DeclId>,
    pub def: TraitDecl,
    pub instantiations: Vec<DeclId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExtensionDecl {
    pub target: Type,
    pub inherited: Vec<Type>,
    pub members: Vec<DeclId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeAliasKind {
    Normal,
    /// `typealias prefix [] = …`.
    Prefix,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAliasDecl {
    pub alias_kind: TypeAliasKind,
    pub template_params: Vec<DeclId>,
    pub value: Type,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDecl {
    pub underlying: Option<Type>,
    pub consts: Vec<DeclId>,
    pub members: Vec<DeclId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumConstDecl {
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableDecl {
    pub var_type: Option<Type>,
    pub initializer: Option<Expr>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParameterMode {
    #[default]
    Val,
    In,
    Out,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDecl {
    /// Externally visible argument label; `_` when unlabeled.
    pub label: Ident,
    pub param_type: Type,
    pub default_value: Option<Expr>,
    pub mode: ParameterMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateParameterKind {
    Typename,
    Const,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateParameterDecl {
    pub param_kind: TemplateParameterKind,
    /// Const parameters: the value type (required). Typename parameters:
    /// the optional specialization bound.
    pub ty: Option<Type>,
    pub default_value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraitPrototypeDecl {
    pub trait_type: Type,
}
