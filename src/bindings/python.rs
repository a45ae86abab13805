// FFI Facade: exposes the evaluation context to Python as the `_core` module.
use crate::builder;
use crate::compute::EvalError;
use crate::context::EvaluationContext;
use crate::display::trace;
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(e: EvalError) -> PyErr {
    match e {
        EvalError::NotFound { .. } => PyKeyError::new_err(e.to_string()),
        EvalError::UnsetVariable { .. } => PyRuntimeError::new_err(e.to_string()),
    }
}

#[pyclass(name = "EvaluationContext")]
#[derive(Debug, Clone, Default)]
pub struct PyEvaluationContext {
    inner: EvaluationContext,
}

#[pymethods]
impl PyEvaluationContext {
    #[staticmethod]
    pub fn from_xml(xml: &str) -> PyResult<Self> {
        builder::from_str(xml)
            .map(|inner| Self { inner })
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[staticmethod]
    pub fn from_file(path: &str) -> PyResult<Self> {
        builder::from_path(path)
            .map(|inner| Self { inner })
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.inner.set_variable(name, value);
    }

    pub fn evaluate(&mut self, name: &str) -> PyResult<f64> {
        self.inner.evaluate(name).map_err(to_py_err)
    }

    pub fn has_expression(&self, name: &str) -> bool {
        self.inner.has_expression(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.inner.has_variable(name)
    }

    pub fn expressions(&self) -> Vec<String> {
        self.inner.expression_names().map(str::to_string).collect()
    }

    pub fn variables(&self) -> Vec<String> {
        self.inner.variable_names().map(str::to_string).collect()
    }

    pub fn trace(&self, name: &str) -> String {
        trace::format_trace(&self.inner, name)
    }
}

/// Defines the `evalgraph._core` Python module.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyEvaluationContext>()?;
    Ok(())
}
