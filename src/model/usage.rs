//! Token 用量：跨步骤、跨委派返回累加

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            ..Self::default()
        }
    }

    /// 返回累加后的新值（不修改自身）
    pub fn add(&self, other: &Usage) -> Usage {
        let mut sum = *self;
        sum += *other;
        sum
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.cached_input_tokens += other.cached_input_tokens;
        self.output_tokens += other.output_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_add_is_field_wise() {
        let a = Usage {
            input_tokens: 10,
            cached_input_tokens: 2,
            output_tokens: 5,
            reasoning_tokens: 1,
            total_tokens: 15,
        };
        let b = Usage::new(3, 4);
        let sum = a.add(&b);
        assert_eq!(sum.input_tokens, 13);
        assert_eq!(sum.cached_input_tokens, 2);
        assert_eq!(sum.output_tokens, 9);
        assert_eq!(sum.reasoning_tokens, 1);
        assert_eq!(sum.total_tokens, 22);
        // 原值不变
        assert_eq!(a.input_tokens, 10);
    }
}
