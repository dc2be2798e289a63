//! Native (text-layer) extraction.

pub mod content;
pub mod layout;
pub mod native;

pub use native::{Attempt, PageText, PdfDocument};

/// In-memory PDF builders for unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Document, Object, Stream, dictionary};

    /// One page per entry, one `Tj` per line, 20pt apart.
    pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
        let streams: Vec<Vec<u8>> = pages
            .iter()
            .map(|lines| {
                let mut operations = vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 10.into()]),
                ];
                for (i, line) in lines.iter().enumerate() {
                    let y = 750 - 20 * i64::try_from(i).unwrap();
                    operations.push(Operation::new(
                        "Tm",
                        vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), y.into()],
                    ));
                    operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                }
                operations.push(Operation::new("ET", vec![]));
                Content { operations }.encode().unwrap()
            })
            .collect();
        let raw: Vec<&[u8]> = streams.iter().map(Vec::as_slice).collect();
        pdf_with_raw_pages(&raw)
    }

    /// One page per raw (unfiltered) content stream.
    pub fn pdf_with_raw_pages(streams: &[&[u8]]) -> Vec<u8> {
        build(streams, None, None)
    }

    /// Like [`pdf_with_raw_pages`], with `/Encoding` set on font `F1`.
    pub fn pdf_with_font_encoding(encoding: &str, streams: &[&[u8]]) -> Vec<u8> {
        build(streams, Some(encoding), None)
    }

    /// A single page whose resources register `form` as XObject `Fm1`.
    ///
    /// The form shares the page's resources, so it can paint itself.
    pub fn pdf_with_form(page: &[u8], form: &[u8], matrix: [i64; 6]) -> Vec<u8> {
        build(&[page], None, Some((form, matrix)))
    }

    fn build(
        streams: &[&[u8]],
        encoding: Option<&str>,
        form: Option<(&[u8], [i64; 6])>,
    ) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        };
        if let Some(encoding) = encoding {
            font.set("Encoding", Object::Name(encoding.as_bytes().to_vec()));
        }
        let font_id = doc.add_object(font);

        let resources_id = doc.new_object_id();
        let mut xobjects = Dictionary::new();
        if let Some((raw, matrix)) = form {
            let form_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                    "Matrix" => matrix.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
                    "Resources" => resources_id,
                },
                raw.to_vec(),
            ));
            xobjects.set("Fm1", form_id);
        }
        doc.objects.insert(
            resources_id,
            Object::Dictionary(dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobjects,
            }),
        );

        let mut kids: Vec<Object> = Vec::new();
        for raw in streams {
            let content_id = doc.add_object(Stream::new(dictionary! {}, raw.to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = i64::try_from(kids.len()).unwrap();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }
}
