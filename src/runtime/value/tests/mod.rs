//! Value 单元测试
//!
//! 测试值的构造、NaN-boxing 编码、字符串表示、数组和文本转换
