//! Lexer of grammar files.

use logos::Logos;

#[derive(Debug, Copy, Clone, PartialEq, Logos)]
#[logos(skip r"([ \t\r\n\f]+|//[^\n]*|#[^\n]*)")]
pub(crate) enum Token<'source> {
    #[token(":")]
    Colon,

    #[token("|")]
    VertBar,

    #[token(";")]
    Semicolon,

    #[token("%start")]
    Start,

    // 引用された記号は空白を含まない
    #[regex(r"'[^'\s]+'", unquote)]
    #[regex(r#""[^"\s]+""#, unquote)]
    Quoted(&'source str),

    #[regex(r##"[^\s:|;'"#/%]+"##, |lex| lex.slice())]
    Ident(&'source str),
}

fn unquote<'source>(lex: &mut logos::Lexer<'source, Token<'source>>) -> &'source str {
    let slice = lex.slice();
    &slice[1..slice.len() - 1]
}
