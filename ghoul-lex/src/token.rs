use ghoul_ast::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Symbol/keyword spelling, raw digits for numbers, cooked text for
    /// strings, the single code point for characters.
    pub text: String,
    pub span: Span,
    /// 1-based line the token starts on (the parser's statement-terminator
    /// rule compares lines).
    pub line: u32,
    pub leading_whitespace: bool,
}

impl Token {
    /// Spelling used in "found `…`" diagnostics.
    pub fn display_text(&self) -> &str {
        if self.text.is_empty() {
            match self.kind {
                TokenKind::EndOfFile => "<eof>",
                _ => "",
            }
        } else {
            &self.text
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenCategory {
    Value,
    Keyword,
    Modifier,
    Operator,
    Special,
    EndOfFile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Value tokens
    Number,
    Character,
    StringLit,
    Symbol,

    // Keywords
    Trait,
    Struct,
    Class,
    Union,
    Enum,
    Operator,
    Prefix,
    Infix,
    Postfix,
    Explicit,
    Implicit,
    Namespace,
    SizeOf,
    AlignOf,
    OffsetOf,
    NameOf,
    TraitsOf,
    If,
    Else,
    Do,
    Repeat,
    While,
    For,
    Switch,
    Case,
    Default,
    Continue,
    Break,
    Goto,
    Return,
    Asm,
    Import,
    As,
    Is,
    Has,
    Try,
    Catch,
    Finally,
    Throw,
    Throws,
    Requires,
    Ensures,
    Where,
    Func,
    Prop,
    Let,
    Var,
    Init,
    Deinit,
    Call,
    Subscript,
    TypeAlias,
    TypeSuffix,
    Extension,
    Fallthrough,
    True,
    False,

    // Modifiers
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Const,
    Mut,
    Immut,
    Extern,
    Volatile,
    Abstract,
    Sealed,
    Virtual,
    Override,
    In,
    Out,
    Ref,
    InOut,

    // Operators
    Equals,
    EqualEquals,
    /// `>` while right-shift is disabled (template argument lists).
    TemplateEnd,
    Greater,
    GreaterEquals,
    RightShift,
    RightShiftEquals,
    Less,
    LessEquals,
    LeftShift,
    LeftShiftEquals,
    Not,
    NotEquals,
    Tilde,
    Plus,
    PlusEquals,
    PlusPlus,
    Minus,
    MinusEquals,
    MinusMinus,
    Star,
    StarEquals,
    Slash,
    SlashEquals,
    Percent,
    PercentEquals,
    Ampersand,
    AmpersandEquals,
    AmpersandAmpersand,
    Pipe,
    PipeEquals,
    PipePipe,
    Caret,
    CaretEquals,
    CaretCaret,
    CaretCaretEquals,
    Period,
    Arrow,
    Colon,
    ColonColon,
    Question,
    QuestionQuestion,
    QuestionPeriod,
    QuestionArrow,
    QuestionLSquare,

    // Special punctuation
    LCurly,
    RCurly,
    LSquare,
    RSquare,
    Semicolon,
    Comma,
    LParen,
    RParen,
    AtSymbol,
    Grave,

    EndOfFile,
}

impl TokenKind {
    pub fn category(self) -> TokenCategory {
        use TokenKind::*;
        match self {
            Number | Character | StringLit | Symbol => TokenCategory::Value,

            Trait | Struct | Class | Union | Enum | Operator | Prefix | Infix | Postfix
            | Explicit | Implicit | Namespace | SizeOf | AlignOf | OffsetOf | NameOf | TraitsOf
            | If | Else | Do | Repeat | While | For | Switch | Case | Default | Continue
            | Break | Goto | Return | Asm | Import | As | Is | Has | Try | Catch | Finally
            | Throw | Throws | Requires | Ensures | Where | Func | Prop | Let | Var | Init
            | Deinit | Call | Subscript | TypeAlias | TypeSuffix | Extension | Fallthrough
            | True | False => TokenCategory::Keyword,

            Public | Private | Protected | Internal | Static | Const | Mut | Immut | Extern
            | Volatile | Abstract | Sealed | Virtual | Override | In | Out | Ref | InOut => {
                TokenCategory::Modifier
            }

            Equals | EqualEquals | TemplateEnd | Greater | GreaterEquals | RightShift
            | RightShiftEquals | Less | LessEquals | LeftShift | LeftShiftEquals | Not
            | NotEquals | Tilde | Plus | PlusEquals | PlusPlus | Minus | MinusEquals
            | MinusMinus | Star | StarEquals | Slash | SlashEquals | Percent | PercentEquals
            | Ampersand | AmpersandEquals | AmpersandAmpersand | Pipe | PipeEquals | PipePipe
            | Caret | CaretEquals | CaretCaret | CaretCaretEquals | Period | Arrow | Colon
            | ColonColon | Question | QuestionQuestion | QuestionPeriod | QuestionArrow
            | QuestionLSquare => TokenCategory::Operator,

            LCurly | RCurly | LSquare | RSquare | Semicolon | Comma | LParen | RParen
            | AtSymbol | Grave => TokenCategory::Special,

            EndOfFile => TokenCategory::EndOfFile,
        }
    }
}

/// Classifies an accumulated identifier-shaped token.
pub(crate) fn keyword_kind(text: &str) -> TokenKind {
    match text {
        // Modifiers
        "public" => TokenKind::Public,
        "private" => TokenKind::Private,
        "protected" => TokenKind::Protected,
        "internal" => TokenKind::Internal,
        "static" => TokenKind::Static,
        "const" => TokenKind::Const,
        "mut" => TokenKind::Mut,
        "immut" => TokenKind::Immut,
        "extern" => TokenKind::Extern,
        "volatile" => TokenKind::Volatile,
        "abstract" => TokenKind::Abstract,
        "sealed" => TokenKind::Sealed,
        "virtual" => TokenKind::Virtual,
        "override" => TokenKind::Override,
        "in" => TokenKind::In,
        "out" => TokenKind::Out,
        "ref" => TokenKind::Ref,
        "inout" => TokenKind::InOut,

        // Keywords
        "trait" => TokenKind::Trait,
        "struct" => TokenKind::Struct,
        "class" => TokenKind::Class,
        "union" => TokenKind::Union,
        "enum" => TokenKind::Enum,
        "operator" => TokenKind::Operator,
        "prefix" => TokenKind::Prefix,
        "infix" => TokenKind::Infix,
        "postfix" => TokenKind::Postfix,
        "explicit" => TokenKind::Explicit,
        "implicit" => TokenKind::Implicit,
        "namespace" => TokenKind::Namespace,
        "sizeof" => TokenKind::SizeOf,
        "alignof" => TokenKind::AlignOf,
        "offsetof" => TokenKind::OffsetOf,
        "nameof" => TokenKind::NameOf,
        "traitsof" => TokenKind::TraitsOf,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "do" => TokenKind::Do,
        "repeat" => TokenKind::Repeat,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "continue" => TokenKind::Continue,
        "break" => TokenKind::Break,
        "goto" => TokenKind::Goto,
        "return" => TokenKind::Return,
        "asm" => TokenKind::Asm,
        "import" => TokenKind::Import,
        "as" => TokenKind::As,
        "is" => TokenKind::Is,
        "has" => TokenKind::Has,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "finally" => TokenKind::Finally,
        "throw" => TokenKind::Throw,
        "throws" => TokenKind::Throws,
        "requires" => TokenKind::Requires,
        "ensures" => TokenKind::Ensures,
        "where" => TokenKind::Where,
        "func" => TokenKind::Func,
        "prop" => TokenKind::Prop,
        "let" => TokenKind::Let,
        "var" => TokenKind::Var,
        "init" => TokenKind::Init,
        "deinit" => TokenKind::Deinit,
        "call" => TokenKind::Call,
        "subscript" => TokenKind::Subscript,
        "typealias" => TokenKind::TypeAlias,
        "typesuffix" => TokenKind::TypeSuffix,
        "extension" => TokenKind::Extension,
        "fallthrough" => TokenKind::Fallthrough,
        "true" => TokenKind::True,
        "false" => TokenKind::False,

        _ => TokenKind::Symbol,
    }
}
