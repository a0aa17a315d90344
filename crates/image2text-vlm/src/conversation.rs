use image2text_io::NormalizedImage;

/// The author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The person asking for a description.
    User,
}

/// One piece of multimodal content.
#[derive(Clone, Debug)]
pub enum ContentPart {
    /// A text segment.
    Text(String),
    /// An image.
    Image(NormalizedImage),
}

impl ContentPart {
    /// The text of a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::Image(_) => None,
        }
    }

    /// The image of an image part.
    pub fn as_image(&self) -> Option<&NormalizedImage> {
        match self {
            ContentPart::Text(_) => None,
            ContentPart::Image(image) => Some(image),
        }
    }
}

/// The ordered multimodal content of a single user turn.
///
/// Built fresh for every request. Multimodal backends are sensitive to the order
/// of the parts, so the order produced by [`ConversationBuilder`] is kept verbatim.
#[derive(Clone, Debug)]
pub struct Conversation {
    role: Role,
    parts: Vec<ContentPart>,
}

impl Conversation {
    /// Build the turn for the given images and optional prompt.
    ///
    /// The prompt, when present and not blank, becomes the first part. One image part
    /// follows per input image, in input order.
    ///
    /// # Example
    ///
    /// ```
    /// use image2text_io::{ImageSize, NormalizedImage};
    /// use image2text_vlm::Conversation;
    ///
    /// let img = NormalizedImage::new(ImageSize { width: 1, height: 1 }, vec![0; 3], None).unwrap();
    /// let conversation = Conversation::build(vec![img], Some("What is this?"));
    ///
    /// assert_eq!(conversation.len(), 2);
    /// assert_eq!(conversation.parts()[0].as_text(), Some("What is this?"));
    /// ```
    pub fn build(images: Vec<NormalizedImage>, prompt: Option<&str>) -> Self {
        let mut builder = ConversationBuilder::new();
        if let Some(prompt) = prompt {
            builder = builder.prompt(prompt);
        }
        builder.images(images).build()
    }

    /// The author of the turn.
    pub fn role(&self) -> Role {
        self.role
    }

    /// All parts in order.
    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    /// The concatenated text parts, if there is any.
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self.parts.iter().filter_map(ContentPart::as_text).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }

    /// The image parts in order.
    pub fn images(&self) -> impl Iterator<Item = &NormalizedImage> {
        self.parts.iter().filter_map(ContentPart::as_image)
    }

    /// Number of parts.
    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the turn has no parts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Assembles a [`Conversation`].
///
/// The prompt is always placed before the images, regardless of the order in which
/// the builder methods are called.
#[derive(Debug, Default)]
pub struct ConversationBuilder {
    prompt: Option<String>,
    images: Vec<NormalizedImage>,
}

impl ConversationBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prompt. Blank prompts are ignored.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.prompt = if prompt.trim().is_empty() {
            None
        } else {
            Some(prompt)
        };
        self
    }

    /// Append one image.
    pub fn image(mut self, image: NormalizedImage) -> Self {
        self.images.push(image);
        self
    }

    /// Append several images, keeping their order.
    pub fn images(mut self, images: impl IntoIterator<Item = NormalizedImage>) -> Self {
        self.images.extend(images);
        self
    }

    /// Produce the turn.
    pub fn build(self) -> Conversation {
        let mut parts = Vec::with_capacity(self.images.len() + 1);
        if let Some(prompt) = self.prompt {
            parts.push(ContentPart::Text(prompt));
        }
        parts.extend(self.images.into_iter().map(ContentPart::Image));

        Conversation {
            role: Role::User,
            parts,
        }
    }
}
