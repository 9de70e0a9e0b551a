//! Stylesheet parsing for the few properties packaging looks at.
//!
//! Rules are read with `cssparser` and their selectors with the `selectors`
//! implementation scraper matches with, so parsed selectors can be matched
//! against scraper documents directly. Only rules that apply on screen are
//! kept: `@media print { ... }` and similar blocks are skipped, `@supports`
//! blocks are taken as supported, and every other at-rule is ignored.

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, StyleSheetParser, Token,
};
use scraper::selector::{Parser as SelectorParser, Simple};
use selectors::parser::{ParseRelative, Selector, SelectorList};

/// A declared value and whether it was marked `!important`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    pub value: String,
    pub important: bool,
}

/// The declarations of one rule (or one `style` attribute) that packaging uses.
/// `font_family` holds the first family of the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub display: Option<Declared>,
    pub font_family: Option<Declared>,
    pub direction: Option<Declared>,
}

impl Declarations {
    /// Declarations of a `style` attribute
    pub fn parse_inline(style: &str) -> Self {
        let mut input = ParserInput::new(style);
        let mut parser = Parser::new(&mut input);
        Self::parse_body(&mut parser)
    }

    fn parse_body(input: &mut Parser<'_, '_>) -> Self {
        let mut declarations = Self::default();
        let mut collector = DeclarationCollector {
            declarations: &mut declarations,
        };
        for result in RuleBodyParser::new(input, &mut collector) {
            // Unknown properties and invalid values are skipped
            let _ = result;
        }
        declarations
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_none() && self.font_family.is_none() && self.direction.is_none()
    }
}

/// A style rule that applies on screen
#[derive(Debug, Clone)]
pub struct StyleRule {
    /// Empty when the selector list uses syntax the matcher does not support
    pub selectors: Vec<Selector<Simple>>,
    pub selector_text: String,
    pub declarations: Declarations,
}

/// Screen rules of a stylesheet, in source order
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    rules: Vec<StyleRule>,
}

impl StyleSheet {
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = Vec::new();
        let mut collector = RuleCollector { rules: &mut rules };
        for result in StyleSheetParser::new(&mut parser, &mut collector) {
            let _ = result;
        }
        Self { rules }
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }
}

/// Whether a media query list matches a screen. Media features are assumed to match.
pub fn media_applies_on_screen(queries: &str) -> bool {
    queries.split(',').any(|query| {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|word| word.to_ascii_lowercase())
            .collect();
        let is_screen = |word: Option<&String>| matches!(word.map(String::as_str), Some("screen" | "all"));
        match words.first().map(String::as_str) {
            None => true,
            Some("not") => !is_screen(words.get(1)),
            Some("only") => is_screen(words.get(1)),
            Some(first) if first.starts_with('(') => true,
            Some(_) => is_screen(words.first()),
        }
    })
}

/// Values of `[lang=...]` attribute selectors, including those nested in
/// functional pseudo-classes such as `:is()`
pub fn lang_attribute_values(selector_text: &str) -> Vec<String> {
    let mut input = ParserInput::new(selector_text);
    let mut parser = Parser::new(&mut input);
    let mut langs = Vec::new();
    collect_lang_values(&mut parser, &mut langs);
    langs
}

fn collect_lang_values(parser: &mut Parser<'_, '_>, langs: &mut Vec<String>) {
    loop {
        let token = match parser.next() {
            Ok(token) => token.clone(),
            Err(_) => return,
        };
        let nested = match token {
            Token::SquareBracketBlock => parser.parse_nested_block(|block| {
                let name = block.expect_ident()?.clone();
                block.expect_delim('=')?;
                let value = block.expect_ident_or_string()?.clone();
                if name.eq_ignore_ascii_case("lang") {
                    langs.push(value.trim().to_string());
                }
                while block.next().is_ok() {}
                Ok::<_, ParseError<'_, ()>>(())
            }),
            Token::Function(_) | Token::ParenthesisBlock => parser.parse_nested_block(|block| {
                collect_lang_values(block, langs);
                Ok::<_, ParseError<'_, ()>>(())
            }),
            _ => Ok(()),
        };
        // A malformed attribute selector only loses its own value
        let _ = nested;
    }
}

/// `serif`, `inherit` and the like name no font file
pub fn is_generic_family(family: &str) -> bool {
    matches!(
        family.to_ascii_lowercase().as_str(),
        "" | "serif"
            | "sans-serif"
            | "monospace"
            | "cursive"
            | "fantasy"
            | "system-ui"
            | "inherit"
            | "initial"
            | "unset"
    )
}

fn first_family<'i>(input: &mut Parser<'i, '_>) -> Result<String, ParseError<'i, ()>> {
    if let Ok(quoted) = input.try_parse(|i| i.expect_string().map(|s| s.trim().to_string())) {
        return Ok(quoted);
    }
    let mut words = vec![input.expect_ident()?.to_string()];
    while let Ok(word) = input.try_parse(|i| i.expect_ident().map(|s| s.to_string())) {
        words.push(word);
    }
    Ok(words.join(" "))
}

/// Skips the rest of a value, reporting whether it ended in `!important`
fn trailing_important(input: &mut Parser<'_, '_>) -> bool {
    loop {
        if input.try_parse(cssparser::parse_important).is_ok() {
            return true;
        }
        if input.next().is_err() {
            return false;
        }
    }
}

struct RuleCollector<'a> {
    rules: &'a mut Vec<StyleRule>,
}

impl<'i> AtRuleParser<'i> for RuleCollector<'_> {
    /// Whether the block's rules apply on screen
    type Prelude = bool;
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let start = input.position();
        while input.next().is_ok() {}
        let prelude = input.slice_from(start);
        if name.eq_ignore_ascii_case("media") {
            Ok(media_applies_on_screen(prelude))
        } else if name.eq_ignore_ascii_case("supports") {
            Ok(true)
        } else {
            Err(input.new_custom_error(()))
        }
    }

    fn parse_block<'t>(
        &mut self,
        applies: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        if applies {
            for result in StyleSheetParser::new(input, self) {
                let _ = result;
            }
        } else {
            while input.next().is_ok() {}
        }
        Ok(())
    }
}

impl<'i> QualifiedRuleParser<'i> for RuleCollector<'_> {
    type Prelude = (Vec<Selector<Simple>>, String);
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let start = input.position();
        let selectors = match SelectorList::parse(&SelectorParser, input, ParseRelative::No) {
            Ok(list) => list.0.into_vec(),
            Err(_) => {
                while input.next().is_ok() {}
                Vec::new()
            }
        };
        Ok((selectors, input.slice_from(start).trim().to_string()))
    }

    fn parse_block<'t>(
        &mut self,
        (selectors, selector_text): Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let declarations = Declarations::parse_body(input);
        if !declarations.is_empty() {
            self.rules.push(StyleRule {
                selectors,
                selector_text,
                declarations,
            });
        }
        Ok(())
    }
}

struct DeclarationCollector<'a> {
    declarations: &'a mut Declarations,
}

impl<'i> AtRuleParser<'i> for DeclarationCollector<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationCollector<'_> {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();
}

impl<'i> DeclarationParser<'i> for DeclarationCollector<'_> {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let property = name.to_ascii_lowercase();
        let value = match property.as_str() {
            "display" | "direction" => input.expect_ident()?.to_ascii_lowercase(),
            "font-family" => first_family(input)?,
            _ => return Err(input.new_custom_error(())),
        };
        let declared = Some(Declared {
            value,
            important: trailing_important(input),
        });
        match property.as_str() {
            "display" => self.declarations.display = declared,
            "direction" => self.declarations.direction = declared,
            _ => self.declarations.font_family = declared,
        }
        Ok(())
    }
}

impl<'i> RuleBodyItemParser<'i, (), ()> for DeclarationCollector<'_> {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}
