//! Type formatting and diagnostic rendering.

use flowsolve_common::diagnostics::{Diagnostic, format_message, get_message_template};
use flowsolve_common::span::Span;

use crate::def::DefinitionStore;
use crate::diagnostics::{DiagnosticArg, ErrorMessage, PendingDiagnostic};
use crate::intern::TypeInterner;
use crate::recursion::{DepthCounter, RecursionProfile};
use crate::types::{LiteralValue, TypeData, TypeId};

/// Renders types as source-like text.
pub struct TypeFormatter<'a> {
    types: &'a TypeInterner,
    defs: Option<&'a DefinitionStore>,
    depth: DepthCounter,
}

impl<'a> TypeFormatter<'a> {
    pub fn new(types: &'a TypeInterner) -> Self {
        TypeFormatter {
            types,
            defs: None,
            depth: DepthCounter::with_profile(RecursionProfile::TypeFormatting),
        }
    }

    /// Use definition names for applications.
    pub fn with_defs(mut self, defs: &'a DefinitionStore) -> Self {
        self.defs = Some(defs);
        self
    }

    pub fn format(&mut self, ty: TypeId) -> String {
        if !self.depth.enter() {
            return "...".to_string();
        }
        let out = self.format_inner(ty);
        self.depth.leave();
        out
    }

    fn format_list(&mut self, ids: &[TypeId], sep: &str) -> String {
        ids.iter()
            .map(|&id| self.format(id))
            .collect::<Vec<_>>()
            .join(sep)
    }

    fn format_inner(&mut self, ty: TypeId) -> String {
        let types = self.types;
        let Some(data) = types.lookup(ty) else {
            return format!("<invalid {}>", ty.0);
        };
        match data {
            TypeData::Intrinsic(kind) => kind.name().to_string(),
            TypeData::Literal(LiteralValue::Number(n)) => format!("{}", n.0),
            TypeData::Literal(LiteralValue::String(atom)) => {
                format!("\"{}\"", types.resolve_atom(atom))
            }
            TypeData::Literal(LiteralValue::Boolean(b)) => b.to_string(),
            TypeData::Var(id) => format!("T{}", id.0),
            TypeData::Union(list) => {
                let members = types.type_list(list);
                self.format_list(&members, " | ")
            }
            TypeData::Intersection(list) => {
                let members = types.type_list(list);
                self.format_list(&members, " & ")
            }
            TypeData::Object(shape) => {
                let shape = types.object_shape(shape);
                if shape.properties.is_empty() {
                    return "{}".to_string();
                }
                let props: Vec<String> = shape
                    .properties
                    .iter()
                    .map(|p| {
                        format!(
                            "{}{}{}: {}",
                            if p.readonly { "readonly " } else { "" },
                            types.resolve_atom(p.name),
                            if p.optional { "?" } else { "" },
                            self.format(p.type_id)
                        )
                    })
                    .collect();
                format!("{{ {} }}", props.join("; "))
            }
            TypeData::Array(elem) => {
                let inner = self.format(elem);
                match types.lookup_stripped(elem) {
                    Some(TypeData::Union(_) | TypeData::Intersection(_) | TypeData::Function(_)) => {
                        format!("({inner})[]")
                    }
                    _ => format!("{inner}[]"),
                }
            }
            TypeData::Function(shape) => {
                let shape = types.function_shape(shape);
                let params = self.format_list(&shape.params, ", ");
                format!("({params}) => {}", self.format(shape.return_type))
            }
            TypeData::Application(app) => match types.type_application(app) {
                Some(app) => {
                    let name = self
                        .defs
                        .and_then(|defs| defs.get_name(app.def))
                        .map(|atom| types.resolve_atom(atom).to_string())
                        .unwrap_or_else(|| format!("Def{}", app.def.0));
                    format!("{name}<{}>", self.format_list(&app.args, ", "))
                }
                None => format!("<invalid {}>", ty.0),
            },
            TypeData::Poly(poly) => match types.poly_type(poly) {
                Some(poly) => {
                    let params: Vec<&str> = poly
                        .params
                        .iter()
                        .map(|&p| types.resolve_atom(p))
                        .collect();
                    format!("<{}>{}", params.join(", "), self.format(poly.body))
                }
                None => format!("<invalid {}>", ty.0),
            },
            TypeData::Param(name) => types.resolve_atom(name).to_string(),
            TypeData::Internal(name) => format!("#{}", types.resolve_atom(name)),
            TypeData::GetProp { name, out } => {
                format!(".{} => {}", types.resolve_atom(name), self.format(out))
            }
            TypeData::Call { args, out } => {
                let args = types.type_list(args);
                format!("call({}) => {}", self.format_list(&args, ", "), self.format(out))
            }
            TypeData::Add { rhs, out, .. } => {
                format!("+ {} => {}", self.format(rhs), self.format(out))
            }
            TypeData::Located { inner, .. } => self.format(inner),
        }
    }

    fn format_arg(&mut self, arg: &DiagnosticArg) -> String {
        match arg {
            DiagnosticArg::Type(ty) => self.format(*ty),
            DiagnosticArg::Atom(atom) => self.types.resolve_atom(*atom).to_string(),
            DiagnosticArg::String(s) => s.to_string(),
            DiagnosticArg::Number(n) => n.to_string(),
        }
    }

    fn message(&mut self, pending: &PendingDiagnostic) -> String {
        let args: Vec<String> = pending.args.iter().map(|a| self.format_arg(a)).collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let template = get_message_template(pending.code).unwrap_or("{0}");
        format_message(template, &args)
    }

    /// Blame location for an error: the use site if known, otherwise the
    /// location attached to either side.
    fn blame_span(&self, error: &ErrorMessage) -> Span {
        let from_use = error.use_op().span();
        if !from_use.is_dummy() {
            return from_use;
        }
        let (lower, upper) = error.pair();
        self.types
            .span_of(lower)
            .or_else(|| self.types.span_of(upper))
            .unwrap_or_else(Span::dummy)
    }

    /// Render a recorded error into a diagnostic.
    pub fn render(&mut self, error: &ErrorMessage) -> Diagnostic {
        let pending = error.to_pending();
        let span = self.blame_span(error);
        let mut diagnostic = Diagnostic::error(span, self.message(&pending), pending.code);
        if let ErrorMessage::NoMatchingAlternative { branches, .. } = error {
            for branch in branches {
                let related_span = self.blame_span(&branch.error);
                let text = self.message(&branch.error.to_pending());
                diagnostic = diagnostic.with_related(related_span, text);
            }
        }
        diagnostic
    }
}

#[cfg(test)]
#[path = "../tests/format_tests.rs"]
mod tests;
