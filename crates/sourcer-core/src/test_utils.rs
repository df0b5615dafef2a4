use crate::{LineIndex, Node, Value};

/// Hand-built trees over a fixed input.
pub struct Trees {
    pub input: &'static str,
    index: LineIndex,
}

impl Trees {
    pub fn new(input: &'static str) -> Self {
        Self {
            input,
            index: LineIndex::new(input),
        }
    }

    pub fn node(&self, rule: &str, start: usize, end: usize, value: Value) -> Node {
        let span = self.index.span(self.input, start..end).unwrap();
        Node::new(rule, span, value)
    }

    pub fn leaf(&self, rule: &str, start: usize, end: usize) -> Value {
        let text = &self.input[start..end];
        Value::from(self.node(rule, start, end, Value::from(text)))
    }

    /// `Sum` over "1+2" with `Num` children and a bound `op` field.
    pub fn sum(&self) -> Node {
        self.node(
            "Sum",
            0,
            3,
            Value::Object(vec![
                ("0".into(), self.leaf("Num", 0, 1)),
                ("op".into(), Value::from("+")),
                ("2".into(), self.leaf("Num", 2, 3)),
            ]),
        )
    }
}
