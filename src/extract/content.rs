//! Minimal content-stream interpreter.
//!
//! Walks a page's text operators, tracking the text and graphics matrices,
//! and emits positioned [`TextRun`]s. Glyph widths are not read from the
//! font programs; each glyph is assumed to be half an em wide, which is
//! enough to tell word gaps from column gaps on statement layouts.
//!
//! Form XObjects painted with `Do` are entered with their own resources and
//! `/Matrix`, so text that a generator wrapped in a form still surfaces.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, trace};

/// Assumed glyph advance as a fraction of the font size.
const GLYPH_WIDTH_EM: f32 = 0.5;

/// Form XObjects nested deeper than this are skipped; self-referencing
/// forms stop here too.
const MAX_FORM_DEPTH: usize = 8;

/// Page-tree levels searched for inherited `/Resources`.
const MAX_TREE_DEPTH: usize = 32;

/// Text shown at one position, in device space (y grows upwards).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub size: f32,
}

/// Affine matrix `[a b c d e f]` as used by PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`
    fn multiply(self, other: Self) -> Self {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Self([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn horizontal_scale(self) -> f32 {
        self.0[0].hypot(self.0[1])
    }

    fn vertical_scale(self) -> f32 {
        self.0[2].hypot(self.0[3])
    }
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
        }
    }
}

/// Failure to interpret a content stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("content stream cannot be decoded: {0}")]
pub struct ContentError(pub String);

/// Decode `raw` (already filtered) and collect its text runs.
///
/// Without a document there are no resources, so `Do` is ignored.
pub fn text_runs(raw: &[u8]) -> Result<Vec<TextRun>, ContentError> {
    let mut interpreter = Interpreter::default();
    interpreter.run(raw, None, 0)?;
    Ok(interpreter.runs)
}

/// Collect the text runs of a page, following the form XObjects it paints.
pub fn page_text_runs(doc: &Document, page_id: ObjectId) -> Result<Vec<TextRun>, ContentError> {
    let raw = doc
        .get_page_content(page_id)
        .map_err(|e| ContentError(format!("page content unreadable: {e}")))?;
    let scope = Scope {
        doc,
        resources: page_resources(doc, page_id),
    };
    let mut interpreter = Interpreter::default();
    interpreter.run(&raw, Some(scope), 0)?;
    Ok(interpreter.runs)
}

/// Where `Do` operands are looked up.
#[derive(Clone, Copy)]
struct Scope<'d> {
    doc: &'d Document,
    resources: Option<&'d Dictionary>,
}

fn resolve_dict<'d>(doc: &'d Document, obj: &'d Object) -> Option<&'d Dictionary> {
    doc.dereference(obj).ok()?.1.as_dict().ok()
}

/// The page's `/Resources`, inherited from the page tree when absent.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        node = resolve_dict(doc, node.get(b"Parent").ok()?)?;
    }
    None
}

/// The form XObject registered under `name`; images and unknown names
/// give `None`.
fn form_xobject<'d>(scope: Scope<'d>, name: &[u8]) -> Option<&'d Stream> {
    let xobjects = resolve_dict(scope.doc, scope.resources?.get(b"XObject").ok()?)?;
    let (_, object) = scope.doc.dereference(xobjects.get(name).ok()?).ok()?;
    let stream = object.as_stream().ok()?;
    let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok()?;
    (subtype == b"Form").then_some(stream)
}

#[derive(Debug, Default)]
struct Interpreter {
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    runs: Vec<TextRun>,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Interpreter {
    fn run(&mut self, raw: &[u8], scope: Option<Scope<'_>>, depth: usize) -> Result<(), ContentError> {
        let content = Content::decode(raw).map_err(|e| ContentError(e.to_string()))?;
        for op in &content.operations {
            match (op.operator.as_str(), scope) {
                ("Do", Some(scope)) => self.paint_form(scope, op, depth),
                _ => self.apply(op),
            }
        }
        Ok(())
    }

    /// Interpret a form XObject as if its stream were inlined between
    /// `q` and `Q`, with the form matrix prepended to the CTM.
    fn paint_form(&mut self, scope: Scope<'_>, op: &Operation, depth: usize) {
        let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
            return;
        };
        let Some(form) = form_xobject(scope, name) else {
            return;
        };
        if depth >= MAX_FORM_DEPTH {
            trace!(depth, "form XObject nesting limit reached");
            return;
        }

        let raw = form
            .decompressed_content()
            .unwrap_or_else(|_| form.content.clone());
        let form_matrix = form
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|items| matrix(&numbers(items)))
            .unwrap_or(Matrix::IDENTITY);
        let inner = Scope {
            doc: scope.doc,
            resources: form
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|r| resolve_dict(scope.doc, r))
                .or(scope.resources),
        };

        let outer = (self.state, self.tm, self.tlm);
        let stack_depth = self.saved.len();
        self.state.ctm = form_matrix.multiply(self.state.ctm);
        if let Err(e) = self.run(&raw, Some(inner), depth + 1) {
            debug!(error = %e, "form XObject skipped");
        }
        self.saved.truncate(stack_depth);
        (self.state, self.tm, self.tlm) = outer;
    }

    fn apply(&mut self, op: &Operation) {
        let nums = || numbers(&op.operands);
        match op.operator.as_str() {
            "q" => self.saved.push(self.state),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(m) = matrix(&nums()) {
                    self.state.ctm = m.multiply(self.state.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(size) = op.operands.get(1).and_then(number) {
                    self.state.font_size = size;
                }
            }
            "Tc" => {
                if let Some(v) = nums().first() {
                    self.state.char_spacing = *v;
                }
            }
            "Tw" => {
                if let Some(v) = nums().first() {
                    self.state.word_spacing = *v;
                }
            }
            "Tz" => {
                if let Some(v) = nums().first() {
                    self.state.h_scale = *v / 100.0;
                }
            }
            "TL" => {
                if let Some(v) = nums().first() {
                    self.state.leading = *v;
                }
            }
            "Td" => {
                if let [tx, ty, ..] = nums()[..] {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty, ..] = nums()[..] {
                    self.state.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix(&nums()) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(bytes) = op.operands.first().and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(bytes) = op.operands.first().and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "\"" => {
                if let [aw, ac, ..] = nums()[..] {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                }
                self.next_line();
                if let Some(bytes) = op.operands.get(2).and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    self.show_array(items);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).multiply(self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    /// Every string in a `TJ` array becomes its own run; layout decides
    /// whether the kerning gaps between them are spaces.
    fn show_array(&mut self, items: &[Object]) {
        for item in items {
            if let Some(bytes) = string_bytes(item) {
                self.show(bytes);
            } else if let Some(adjust) = number(item) {
                let tx = -adjust / 1000.0 * self.state.font_size * self.state.h_scale;
                self.advance(tx);
            }
        }
    }

    fn show(&mut self, bytes: &[u8]) {
        let Some(text) = decode_pdf_string(bytes) else {
            return;
        };
        let state = self.state;
        let mut tx = 0.0;
        for c in text.chars() {
            tx += GLYPH_WIDTH_EM * state.font_size + state.char_spacing;
            if c == ' ' {
                tx += state.word_spacing;
            }
        }
        tx *= state.h_scale;

        let trm = self.tm.multiply(state.ctm);
        let size = state.font_size * trm.vertical_scale();
        let width = tx * trm.horizontal_scale();
        if !text.trim().is_empty() {
            self.runs.push(TextRun {
                text,
                x: trm.0[4],
                y: trm.0[5],
                width,
                size,
            });
        }
        self.advance(tx);
    }

    fn advance(&mut self, tx: f32) {
        self.tm = Matrix::translate(tx, 0.0).multiply(self.tm);
    }
}

fn number(obj: &Object) -> Option<f32> {
    obj.as_float().ok()
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

fn matrix(nums: &[f32]) -> Option<Matrix> {
    match *nums {
        [a, b, c, d, e, f] => Some(Matrix([a, b, c, d, e, f])),
        _ => None,
    }
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

/// Decode a PDF string operand.
///
/// UTF-16BE with a byte-order mark, otherwise a single-byte encoding
/// (WinAnsi, which is Latin-1 outside 0x80..0xA0). Returns `None` for
/// strings dominated by control bytes, which is what two-byte CID glyph
/// codes look like through a single-byte lens.
pub fn decode_pdf_string(bytes: &[u8]) -> Option<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }

    let control = bytes.iter().filter(|b| **b < 0x20).count();
    if !bytes.is_empty() && control * 2 >= bytes.len() {
        return None;
    }
    Some(
        bytes
            .iter()
            .filter(|b| **b >= 0x20)
            .map(|&b| win_ansi(b))
            .collect(),
    )
}

fn win_ansi(b: u8) -> char {
    match b {
        0x80 => '€',
        0x82 => '‚',
        0x84 => '„',
        0x85 => '…',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        other => char::from(other),
    }
}
