//! XML record codec using `quick-xml`.
//!
//! Document layout:
//!
//! ```text
//! <?xml version="1.0" encoding="utf-8"?>
//! <ITstudent>
//!   <Name>..</Name>
//!   <StudentID>..</StudentID>
//!   <Programme>..</Programme>
//!   <Courses>
//!     <Course><Name>..</Name><Mark>..</Mark></Course>
//!   </Courses>
//! </ITstudent>
//! ```
//!
//! Written without indentation. Leaf text is escaped on write and kept
//! byte-exact on read (no trimming), except numeric fields which are
//! trimmed before parsing. Declarations, comments, processing
//! instructions and whitespace between elements are ignored on read.

use std::collections::BTreeMap;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::RecordCodec;
use crate::error::{BufferdError, Result};
use crate::record::Record;

const ROOT: &str = "ITstudent";
const NAME: &str = "Name";
const STUDENT_ID: &str = "StudentID";
const PROGRAMME: &str = "Programme";
const COURSES: &str = "Courses";
const COURSE: &str = "Course";
const MARK: &str = "Mark";

/// XML codec for records (the reference wire encoding).
pub struct XmlCodec;

impl RecordCodec for XmlCodec {
    const NAME: &'static str = "xml";

    fn encode(record: &Record) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::with_capacity(256));

        write(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
        )?;
        write(&mut writer, Event::Start(BytesStart::new(ROOT)))?;
        write_leaf(&mut writer, NAME, &record.name)?;
        write_leaf(&mut writer, STUDENT_ID, &record.student_id.to_string())?;
        write_leaf(&mut writer, PROGRAMME, &record.programme)?;

        write(&mut writer, Event::Start(BytesStart::new(COURSES)))?;
        for (course, mark) in &record.courses {
            write(&mut writer, Event::Start(BytesStart::new(COURSE)))?;
            write_leaf(&mut writer, NAME, course)?;
            write_leaf(&mut writer, MARK, &mark.to_string())?;
            write(&mut writer, Event::End(BytesEnd::new(COURSE)))?;
        }
        write(&mut writer, Event::End(BytesEnd::new(COURSES)))?;

        write(&mut writer, Event::End(BytesEnd::new(ROOT)))?;
        Ok(writer.into_inner())
    }

    fn decode(bytes: &[u8]) -> Result<Record> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| BufferdError::Xml(format!("payload is not UTF-8: {}", e)))?;
        let root = parse_tree(text)?;

        if root.name != ROOT {
            return Err(BufferdError::InvalidRecord(format!(
                "expected <{}> root, got <{}>",
                ROOT, root.name
            )));
        }

        let mut courses = BTreeMap::new();
        for course in root.child(COURSES)?.children.iter() {
            if course.name != COURSE {
                continue;
            }
            let name = course.child(NAME)?.text.clone();
            let mark = parse_number(&course.child(MARK)?.text, MARK)?;
            if courses.insert(name.clone(), mark).is_some() {
                return Err(BufferdError::InvalidRecord(format!(
                    "duplicate course {:?}",
                    name
                )));
            }
        }

        Ok(Record {
            name: root.child(NAME)?.text.clone(),
            student_id: parse_number(&root.child(STUDENT_ID)?.text, STUDENT_ID)?,
            programme: root.child(PROGRAMME)?.text.clone(),
            courses,
        })
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| BufferdError::Xml(e.to_string()))
}

fn write_leaf(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(tag)))?;
    if !text.is_empty() {
        write(writer, Event::Text(BytesText::new(text)))?;
    }
    write(writer, Event::End(BytesEnd::new(tag)))
}

fn parse_number<T: std::str::FromStr>(text: &str, field: &str) -> Result<T> {
    text.trim().parse().map_err(|_| {
        BufferdError::InvalidRecord(format!("<{}> is not an integer: {:?}", field, text))
    })
}

/// Minimal element tree: just enough structure to pick fields out of.
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// First child with the given name.
    fn child(&self, name: &str) -> Result<&Element> {
        self.children
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                BufferdError::InvalidRecord(format!("<{}> is missing <{}>", self.name, name))
            })
    }
}

fn element_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| BufferdError::Xml(format!("element name is not UTF-8: {}", e)))
}

fn xml_err(e: impl std::fmt::Display) -> BufferdError {
    BufferdError::Xml(e.to_string())
}

/// Parse a document into its root element.
fn parse_tree(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => {
                stack.push(Element::new(element_name(e.name().as_ref())?));
            }
            Event::Empty(e) => {
                let element = Element::new(element_name(e.name().as_ref())?);
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| BufferdError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(t) => {
                let unescaped = t.unescape().map_err(xml_err)?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&unescaped),
                    None if unescaped.trim().is_empty() => {}
                    None => {
                        return Err(BufferdError::Xml(
                            "text outside the root element".to_string(),
                        ))
                    }
                }
            }
            Event::CData(c) => {
                let data = std::str::from_utf8(&c)
                    .map_err(|e| BufferdError::Xml(format!("CDATA is not UTF-8: {}", e)))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(data);
                }
            }
            Event::Eof => break,
            // Decl, Comment, PI, DocType
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(BufferdError::Xml(format!(
            "document ended inside <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| BufferdError::Xml("document has no root element".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(BufferdError::Xml(
                "document has more than one root element".to_string(),
            ))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut courses = BTreeMap::new();
        courses.insert("Programming 101".to_string(), 75);
        courses.insert("Web Development".to_string(), 48);
        courses.insert("AI and Machine Learning".to_string(), 91);
        Record::new("Hannah Garcia", 31415926, "Computer Science", courses)
    }

    #[test]
    fn test_encode_decode_record() {
        let original = sample();
        let encoded = XmlCodec::encode(&original).unwrap();
        assert_eq!(XmlCodec::decode(&encoded).unwrap(), original);
    }

    #[test]
    fn test_encoded_layout() {
        let encoded = XmlCodec::encode(&sample()).unwrap();
        let text = String::from_utf8(encoded).unwrap();

        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(text.contains("<ITstudent><Name>Hannah Garcia</Name>"));
        assert!(text.contains("<StudentID>31415926</StudentID>"));
        assert!(text.contains("<Course><Name>Web Development</Name><Mark>48</Mark></Course>"));
        assert!(text.ends_with("</Courses></ITstudent>"));
    }

    #[test]
    fn test_no_courses() {
        let original = Record::new("Ian Brown", 1, "Data Science", BTreeMap::new());
        let encoded = XmlCodec::encode(&original).unwrap();
        assert_eq!(XmlCodec::decode(&encoded).unwrap(), original);
    }

    #[test]
    fn test_unicode_and_markup_characters_survive() {
        let mut courses = BTreeMap::new();
        courses.insert("Réseaux & <Sécurité>".to_string(), 100);
        courses.insert("数据结构".to_string(), 0);
        let original = Record::new(
            "  Zoë \"Q\" O'Brien  ",
            -42,
            "Ingénierie\nlogicielle",
            courses,
        );

        let encoded = XmlCodec::encode(&original).unwrap();
        assert_eq!(XmlCodec::decode(&encoded).unwrap(), original);
    }

    #[test]
    fn test_empty_strings_survive() {
        let mut courses = BTreeMap::new();
        courses.insert(String::new(), 55);
        let original = Record::new("", 7, "", courses);

        let encoded = XmlCodec::encode(&original).unwrap();
        assert_eq!(XmlCodec::decode(&encoded).unwrap(), original);
    }

    #[test]
    fn test_decode_foreign_document() {
        // Single quotes in the declaration, self-closing empty course list.
        let doc = b"<?xml version='1.0' encoding='utf-8'?>\n\
            <ITstudent><Name>Emily Smith</Name><StudentID> 12345678 </StudentID>\
            <Programme>Cybersecurity</Programme><Courses /></ITstudent>";

        let record = XmlCodec::decode(doc).unwrap();
        assert_eq!(record.name, "Emily Smith");
        assert_eq!(record.student_id, 12345678);
        assert!(record.courses.is_empty());
    }

    #[test]
    fn test_decode_rejects_duplicate_course() {
        let doc = b"<ITstudent><Name>A</Name><StudentID>1</StudentID><Programme>P</Programme>\
            <Courses><Course><Name>X</Name><Mark>1</Mark></Course>\
            <Course><Name>X</Name><Mark>2</Mark></Course></Courses></ITstudent>";

        let err = XmlCodec::decode(doc).unwrap_err();
        assert!(err.to_string().contains("duplicate course"));
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let doc = b"<ITstudent><Name>A</Name><Programme>P</Programme><Courses/></ITstudent>";
        let err = XmlCodec::decode(doc).unwrap_err();
        assert!(matches!(err, BufferdError::InvalidRecord(_)));
        assert!(err.to_string().contains("StudentID"));
    }

    #[test]
    fn test_decode_rejects_non_numeric_mark() {
        let doc = b"<ITstudent><Name>A</Name><StudentID>1</StudentID><Programme>P</Programme>\
            <Courses><Course><Name>X</Name><Mark>high</Mark></Course></Courses></ITstudent>";
        assert!(matches!(
            XmlCodec::decode(doc),
            Err(BufferdError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_document() {
        let encoded = XmlCodec::encode(&sample()).unwrap();
        let cut = &encoded[..encoded.len() / 2];
        assert!(XmlCodec::decode(cut).is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_root() {
        let doc = b"<Lecturer><Name>A</Name></Lecturer>";
        assert!(matches!(
            XmlCodec::decode(doc),
            Err(BufferdError::InvalidRecord(_))
        ));
    }
}
