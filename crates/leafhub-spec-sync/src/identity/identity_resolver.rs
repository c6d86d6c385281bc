//! 用户身份解析

use base64::{
    alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use leafhub_common::{Error, Result, SyncObject, CONTROLLER_IDENTITY, USER_IDENTITY_ANNOTATION};

/// 标准字母表且要求规范填充；与上游编码器一致，允许末尾多余位非零
const IDENTITY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// 从对象注解中解析用户身份
///
/// 没有注解或没有身份注解时返回控制器身份（空字符串）。按行折断的编码中的 `\r`/`\n` 会被忽略；
/// 注解值不是合法 base64 或解码结果不是 UTF-8 文本时返回 [`Error::IdentityDecode`]。
pub fn resolve_identity(obj: &impl SyncObject) -> Result<String> {
    let Some(encoded) = obj.annotation(USER_IDENTITY_ANNOTATION) else {
        return Ok(CONTROLLER_IDENTITY.to_string());
    };

    let encoded: String = encoded.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
    let decoded = IDENTITY_ENGINE
        .decode(encoded)
        .map_err(|e| Error::IdentityDecode(format!("base64 解码失败: {e}")))?;

    String::from_utf8(decoded)
        .map_err(|e| Error::IdentityDecode(format!("用户身份不是合法的 UTF-8 文本: {e}")))
}
