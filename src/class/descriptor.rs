use std::fmt::{self, Display, Formatter};
use std::str::Chars;

use crate::error::ClassError;

/// A parsed field or method descriptor. Both the class-file validator and the
/// interpreter's invocation prologue walk descriptors; this is the one
/// tokenizer shared by both.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FieldDescriptor {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    Object(String),
    Array(Box<FieldDescriptor>),

    // Only valid as a method return type
    Void,
    Method {
        args: Vec<FieldDescriptor>,
        returns: Box<FieldDescriptor>,
    },
}

impl FieldDescriptor {
    /// Parse a full descriptor string. Method descriptors start with `(`;
    /// anything else is parsed as a single field type. Trailing garbage is
    /// rejected.
    pub fn read_str(text: &str) -> Result<Self, ClassError> {
        let mut chars = text.chars();
        let parsed = if text.starts_with('(') {
            chars.next();
            let mut args = Vec::new();
            loop {
                match chars.clone().next() {
                    Some(')') => {
                        chars.next();
                        break;
                    }
                    Some(_) => args.push(FieldDescriptor::read_field(text, &mut chars, false)?),
                    None => return Err(ClassError::Descriptor(text.to_string())),
                }
            }
            FieldDescriptor::Method {
                returns: Box::new(FieldDescriptor::read_field(text, &mut chars, true)?),
                args,
            }
        } else {
            FieldDescriptor::read_field(text, &mut chars, false)?
        };

        match chars.next() {
            Some(_) => Err(ClassError::Descriptor(text.to_string())),
            None => Ok(parsed),
        }
    }

    fn read_field(
        text: &str,
        chars: &mut Chars<'_>,
        void_ok: bool,
    ) -> Result<Self, ClassError> {
        let err = || ClassError::Descriptor(text.to_string());

        Ok(match chars.next().ok_or_else(err)? {
            'B' => FieldDescriptor::Byte,
            'C' => FieldDescriptor::Char,
            'D' => FieldDescriptor::Double,
            'F' => FieldDescriptor::Float,
            'I' => FieldDescriptor::Int,
            'J' => FieldDescriptor::Long,
            'S' => FieldDescriptor::Short,
            'Z' => FieldDescriptor::Boolean,
            'V' if void_ok => FieldDescriptor::Void,
            'L' => {
                let mut name = String::new();
                loop {
                    match chars.next().ok_or_else(err)? {
                        ';' => break,
                        c => name.push(c),
                    }
                }
                if name.is_empty() {
                    return Err(err());
                }
                FieldDescriptor::Object(name)
            }
            '[' => FieldDescriptor::Array(Box::new(FieldDescriptor::read_field(
                text, chars, false,
            )?)),
            _ => return Err(err()),
        })
    }

    /// Number of local variable slots this type occupies as a parameter.
    pub fn word_len(&self) -> usize {
        match self {
            FieldDescriptor::Long | FieldDescriptor::Double => 2,
            _ => 1,
        }
    }

    pub fn is_wide(&self) -> bool {
        self.word_len() == 2
    }
}

impl Display for FieldDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FieldDescriptor::Byte => write!(f, "B"),
            FieldDescriptor::Char => write!(f, "C"),
            FieldDescriptor::Double => write!(f, "D"),
            FieldDescriptor::Float => write!(f, "F"),
            FieldDescriptor::Int => write!(f, "I"),
            FieldDescriptor::Long => write!(f, "J"),
            FieldDescriptor::Short => write!(f, "S"),
            FieldDescriptor::Boolean => write!(f, "Z"),
            FieldDescriptor::Object(name) => write!(f, "L{};", name),
            FieldDescriptor::Array(entry) => write!(f, "[{}", entry),
            FieldDescriptor::Void => write!(f, "V"),
            FieldDescriptor::Method { args, returns } => {
                write!(f, "(")?;

                for arg in args {
                    write!(f, "{}", arg)?;
                }

                write!(f, "){}", returns)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FieldDescriptor::{self, *};

    fn parse(text: &str) -> FieldDescriptor {
        FieldDescriptor::read_str(text).unwrap()
    }

    #[test]
    fn field_types() {
        assert_eq!(parse("I"), Int);
        assert_eq!(parse("Ljava/lang/String;"), Object("java/lang/String".into()));
        assert_eq!(parse("[[J"), Array(Box::new(Array(Box::new(Long)))));
    }

    #[test]
    fn method_types() {
        assert_eq!(
            parse("(IJLjava/lang/String;)V"),
            Method {
                args: vec![Int, Long, Object("java/lang/String".into())],
                returns: Box::new(Void),
            }
        );
        assert_eq!(
            parse("()I"),
            Method {
                args: vec![],
                returns: Box::new(Int),
            }
        );
    }

    #[test]
    fn rejects_malformed() {
        for text in &["", "Q", "L;", "Lmissing/semi", "II", "(I", "()", "(V)V", "[", "(I)VV"] {
            assert!(
                FieldDescriptor::read_str(text).is_err(),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn void_only_as_return() {
        assert!(FieldDescriptor::read_str("V").is_err());
        assert_eq!(
            parse("()V"),
            Method {
                args: vec![],
                returns: Box::new(Void),
            }
        );
    }

    #[test]
    fn wire_form_round_trips() {
        for text in &["(IDLjava/lang/Thread;)Ljava/lang/Object;", "[[[Z", "()V"] {
            assert_eq!(parse(text).to_string(), *text);
        }
    }

    #[test]
    fn parameter_widths() {
        assert_eq!(parse("J").word_len(), 2);
        assert_eq!(parse("D").word_len(), 2);
        assert_eq!(parse("[D").word_len(), 1);
        assert_eq!(parse("Ljava/lang/Object;").word_len(), 1);
    }
}
