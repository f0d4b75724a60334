use std::sync::Arc;

use rust_decimal::Decimal;

use crate::core::{Cost, HookError, HookResult, Registry, ResourceId};

#[derive(Debug, Clone)]
pub enum FormulaValue {
    Unit,
    Bool(bool),
    Number(Decimal),
    Text(String),
    Costs(Vec<Cost>),
}

impl FormulaValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Costs(_) => "cost list",
        }
    }

    pub fn into_number(self) -> HookResult<Decimal> {
        match self {
            Self::Number(value) => Ok(value),
            other => Err(mismatch("number", &other)),
        }
    }

    pub fn into_bool(self) -> HookResult<bool> {
        match self {
            Self::Bool(value) => Ok(value),
            other => Err(mismatch("bool", &other)),
        }
    }

    pub fn into_costs(self) -> HookResult<Vec<Cost>> {
        match self {
            Self::Costs(costs) => Ok(costs),
            Self::Unit => Ok(Vec::new()),
            other => Err(mismatch("cost list", &other)),
        }
    }
}

fn mismatch(expected: &'static str, found: &FormulaValue) -> HookError {
    HookError::Type {
        expected,
        found: found.type_name(),
    }
}

pub type Formula =
    Arc<dyn Fn(&Registry, ResourceId, &[FormulaValue]) -> HookResult<FormulaValue> + Send + Sync>;

/// Turns textual hook bodies into callables.
///
/// Compilation happens once, when a resource definition carrying text hooks
/// is upserted. The expression grammar belongs to the implementor.
pub trait FormulaCompiler {
    fn compile(&self, body: &str, params: &[&str]) -> HookResult<Formula>;
}

/// Compiles `body`, or yields a formula that reports the compile error each
/// time it is evaluated.
pub(crate) fn compile_or_fail(
    compiler: Option<&(dyn FormulaCompiler + Send + Sync)>,
    body: &str,
    params: &[&str],
) -> Formula {
    let compiled = match compiler {
        Some(compiler) => compiler.compile(body, params),
        None => Err(HookError::Compile {
            body: body.to_string(),
            message: "no formula compiler registered".to_string(),
        }),
    };

    compiled.unwrap_or_else(|error| {
        Arc::new(move |_: &Registry, _: ResourceId, _: &[FormulaValue]| Err(error.clone()))
    })
}
