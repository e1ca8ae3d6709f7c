use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono_tz::Tz;
use roxmltree::Node;
use tracing::{debug, info, instrument};

use crate::crypto::{CertificateFacts, CryptoBackend};
use crate::xades::context::{SignatureContext, SignatureIdentity, SigningRequest};
use crate::xades::template::{XadesFields, XadesTemplate};
use crate::xades::{Error, Result, ns};
use crate::xml::{
    C14nMode, NamespaceMap, Rewrites, XmlDocument, canonical_string, canonicalize,
    canonicalize_with, child_elements_named, elements_named, elements_with_attribute,
};

/// Produces XAdES-BES enveloped signatures.
pub struct XadesSigner<B> {
    backend: B,
    template: XadesTemplate,
    timezone: Tz,
    output_mode: C14nMode,
}

impl<B: CryptoBackend> XadesSigner<B> {
    /// Signer with the built-in template, signing times in
    /// `Asia/Krasnoyarsk` and comments kept in the output.
    pub fn new(backend: B) -> Result<Self> {
        Ok(Self {
            backend,
            template: XadesTemplate::builtin()?,
            timezone: chrono_tz::Asia::Krasnoyarsk,
            output_mode: C14nMode::INCLUSIVE_WITH_COMMENTS,
        })
    }

    pub fn with_template(mut self, template: XadesTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_output_comments(mut self, keep: bool) -> Self {
        self.output_mode = if keep {
            C14nMode::INCLUSIVE_WITH_COMMENTS
        } else {
            C14nMode::INCLUSIVE
        };
        self
    }

    /// Sign with a fresh signature id and the current time.
    pub async fn sign(&self, request: &SigningRequest) -> Result<Vec<u8>> {
        let identity = SignatureIdentity::generate(&self.timezone);
        self.sign_with_identity(request, identity).await
    }

    /// Sign with caller-supplied identifiers and return the canonical
    /// signed document.
    #[instrument(
        skip_all,
        fields(signed_id = %request.signed_id(), signature_id = %identity.signature_id)
    )]
    pub async fn sign_with_identity(
        &self,
        request: &SigningRequest,
        identity: SignatureIdentity,
    ) -> Result<Vec<u8>> {
        let source = XmlDocument::from_bytes(request.document())?;
        let tree = source.parse_doc()?;
        let namespaces = NamespaceMap::new().bind("ds", ns::DS).with_document(&tree);
        let ctx = SignatureContext::new(identity, request.signed_id());
        info!(bindings = namespaces.len(), "document loaded");

        let target = find_by_id(tree.root(), ctx.signed_id())?;

        // Comments inside the signed element are not covered
        let digest1 = self
            .digest_b64(&canonicalize(target, C14nMode::EXCLUSIVE))
            .await?;
        debug!(%digest1, "signed element digest");
        ctx.set_digest1(digest1)?;

        let facts = CertificateFacts::collect(&self.backend, request.key_path()).await?;
        info!(issuer = %facts.issuer_name, serial = %facts.serial_number, "certificate loaded");

        let digest2 = self.digest_b64(&facts.der()?).await?;
        debug!(%digest2, "certificate digest");
        ctx.set_digest2(digest2)?;

        let hash_alg = self.backend.hash_alg();
        let rendered = self.template.render(&XadesFields {
            signed_id: ctx.signed_id(),
            signature_id: &ctx.identity().signature_id,
            signing_time: &ctx.identity().signing_time,
            x509_issuer_name: &facts.issuer_name,
            x509_sn: &facts.serial_number,
            digest1: ctx.require(ctx.digest1(), "digest1")?,
            digest2: ctx.require(ctx.digest2(), "digest2")?,
            digest3: None,
            signature_value: None,
            x509_cert: &facts.certificate,
            digest_method: hash_alg.digest_uri(),
            signature_method: hash_alg.signature_uri(),
        });
        XmlDocument::parse(rendered.as_str())
            .map_err(|e| Error::Template(format!("rendered block is not well-formed: {e}")))?;

        let mut embed = Rewrites::new();
        embed.insert_first_child(target.id(), rendered);
        let embedded = XmlDocument::parse(canonical_string(
            tree.root(),
            C14nMode::INCLUSIVE_WITH_COMMENTS,
            &embed,
        ))
        .map_err(|e| Error::Template(format!("embedded block does not parse: {e}")))?;
        let tree = embedded.parse_doc()?;
        let signature = find_by_id(tree.root(), ctx.signed_id())?
            .children()
            .find(|node| node.is_element())
            .ok_or_else(|| Error::Template("signature block was not embedded".into()))?;
        info!("signature block embedded");

        let props = find_by_id(signature, &ctx.identity().signed_props_id())?;
        let digest3 = self
            .digest_b64(&canonicalize(props, C14nMode::INCLUSIVE))
            .await?;
        debug!(%digest3, "signed properties digest");
        ctx.set_digest3(digest3)?;

        let signed_info = single(
            elements_named(signature, namespaces.resolve("ds:SignedInfo")?),
            "ds:SignedInfo",
        )?;
        let props_uri = ctx.identity().signed_props_uri();
        let digest_value = namespaces.resolve("ds:DigestValue")?;
        let props_digest = single(
            child_elements_named(signed_info, namespaces.resolve("ds:Reference")?)
                .into_iter()
                .filter(|reference| reference.attribute("URI") == Some(props_uri.as_str()))
                .flat_map(|reference| child_elements_named(reference, digest_value))
                .collect(),
            "signed properties ds:DigestValue",
        )?;

        let mut patches = Rewrites::new();
        patches.set_text(props_digest.id(), ctx.require(ctx.digest3(), "digest3")?);

        let signature_value = self
            .sign_b64(
                &canonicalize_with(signed_info, C14nMode::INCLUSIVE, &patches),
                request,
            )
            .await?;
        ctx.set_signature(signature_value)?;
        info!("signed info signed");

        let value_node = single(
            elements_named(signature, namespaces.resolve("ds:SignatureValue")?),
            "ds:SignatureValue",
        )?;
        patches.set_text(value_node.id(), ctx.require(ctx.signature(), "signature")?);

        Ok(canonicalize_with(tree.root(), self.output_mode, &patches))
    }

    async fn digest_b64(&self, data: &[u8]) -> Result<String> {
        Ok(BASE64.encode(self.backend.digest(data).await?))
    }

    async fn sign_b64(&self, data: &[u8], request: &SigningRequest) -> Result<String> {
        Ok(BASE64.encode(self.backend.sign(data, request.key_path()).await?))
    }
}

/// The single element under `scope` whose `Id` equals `id`.
fn find_by_id<'a, 'input>(scope: Node<'a, 'input>, id: &str) -> Result<Node<'a, 'input>> {
    match elements_with_attribute(scope, "Id", id).as_slice() {
        [] => Err(Error::TargetNotFound(id.to_string())),
        [node] => Ok(*node),
        found => Err(Error::AmbiguousTarget {
            id: id.to_string(),
            count: found.len(),
        }),
    }
}

/// The only element in `found`, or a template error naming `what`.
fn single<'a, 'input>(found: Vec<Node<'a, 'input>>, what: &str) -> Result<Node<'a, 'input>> {
    match found.as_slice() {
        [node] => Ok(*node),
        _ => Err(Error::Template(format!(
            "expected one {what} in the signature block, found {}",
            found.len()
        ))),
    }
}
